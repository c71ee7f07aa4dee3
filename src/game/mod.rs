//! 井字棋核心逻辑模块（棋盘状态、回合规则）。

pub mod rules;
pub mod state;

pub use rules::{PlaceAction, RuleEngine, RuleError, RuleResolution};
pub use state::{
    Board,
    GameEvent,
    GameMode,
    GameOutcome,
    GameState,
    IntegrityError,
    Mark,
    Move,
    Player,
    BOARD_SIDE,
};
