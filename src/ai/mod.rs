//! AI 算法模块（随机落子与完整极小化极大搜索）。

pub mod minimax;

pub use minimax::{decide_move, minimax, AiAgent, AiConfig, AiDecision, AiDifficulty, AiStrategy};
