pub mod ai;
pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{decide_move, minimax, AiAgent, AiConfig, AiDecision, AiDifficulty, AiStrategy};
pub use game::{
    Board, GameEvent, GameMode, GameOutcome, GameState, IntegrityError, Mark, Move, PlaceAction,
    Player, RuleEngine, RuleError, RuleResolution,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn make_resolution_json(resolution: RuleResolution) -> Result<String, JsValue> {
    serde_json::to_string(&resolution).map_err(serde_to_js_error)
}

fn resolution_from_events(state: &GameState, events: Vec<GameEvent>) -> RuleResolution {
    RuleResolution::new(state.clone(), events)
}

fn execute_with_engine<F>(state: &mut GameState, action: F) -> Result<Vec<GameEvent>, JsValue>
where
    F: FnOnce(&mut RuleEngine, &mut GameState) -> Result<Vec<GameEvent>, RuleError>,
{
    let mut engine = RuleEngine::new();
    action(&mut engine, state).map_err(to_js_error)
}

/// 未传难度时取默认的简单难度；无法识别的难度直接报错。
fn parse_difficulty(difficulty: Option<&str>) -> Result<AiDifficulty, RuleError> {
    difficulty.map_or(Ok(AiDifficulty::default()), AiDifficulty::from_str)
}

/// 页面上的模式按钮：`two-player` 或 `computer-player`。
fn parse_mode(mode: Option<&str>, difficulty: Option<&str>) -> Result<GameMode, RuleError> {
    match mode.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        Some("computer" | "computer-player" | "vs-computer" | "single") => {
            Ok(GameMode::VsComputer {
                difficulty: parse_difficulty(difficulty)?,
            })
        }
        _ => Ok(GameMode::TwoPlayer),
    }
}

fn ensure_computer_turn(state: &GameState) -> Result<(), RuleError> {
    if state.is_finished() {
        return Err(RuleError::GameFinished);
    }
    if state.difficulty().is_none() {
        return Err(RuleError::NoComputerOpponent);
    }
    if !state.is_computer_turn() {
        return Err(RuleError::NotPlayerTurn {
            expected: state.current_player,
            actual: Player::O,
        });
    }
    Ok(())
}

#[derive(Serialize)]
struct AiMoveResponse {
    decision: AiDecision,
    applied: RuleResolution,
}

/// 一局游戏的会话对象，取代页面脚本中的全局变量。
#[wasm_bindgen]
pub struct GameEngine {
    state: GameState,
    agent: AiAgent,
}

#[wasm_bindgen]
impl GameEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(mode: Option<String>, difficulty: Option<String>) -> Result<GameEngine, JsValue> {
        let mode = parse_mode(mode.as_deref(), difficulty.as_deref()).map_err(to_js_error)?;
        let config = AiConfig::from_difficulty(match mode {
            GameMode::VsComputer { difficulty } => difficulty,
            GameMode::TwoPlayer => AiDifficulty::default(),
        });
        Ok(GameEngine {
            state: GameState::new(mode),
            agent: AiAgent::new(config),
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state).map_err(serde_to_js_error)
    }

    pub fn board(&self) -> Result<JsValue, JsValue> {
        to_value(&self.state.board).map_err(JsValue::from)
    }

    pub fn outcome(&self) -> Result<JsValue, JsValue> {
        to_value(&self.state.outcome).map_err(JsValue::from)
    }

    pub fn is_computer_turn(&self) -> bool {
        self.state.is_computer_turn()
    }

    /// 人类玩家在 (row, col) 落子，返回结算结果 JSON。
    pub fn play(&mut self, row: usize, col: usize) -> Result<String, JsValue> {
        if self.state.is_computer_turn() {
            return Err(to_js_error(RuleError::NotPlayerTurn {
                expected: Player::O,
                actual: Player::X,
            }));
        }
        let action = PlaceAction::new(self.state.current_player, Move::new(row, col));
        let events = execute_with_engine(&mut self.state, |engine, state| {
            engine.place(state, action.clone())
        })?;
        make_resolution_json(resolution_from_events(&self.state, events))
    }

    pub fn apply_ai_move(&mut self) -> Result<String, JsValue> {
        ensure_computer_turn(&self.state).map_err(to_js_error)?;

        let decision = self.agent.decide(&self.state.board).map_err(to_js_error)?;
        let action = PlaceAction::new(Player::O, decision.action);
        let events = execute_with_engine(&mut self.state, |engine, state| {
            engine.place(state, action.clone())
        })?;

        let response = AiMoveResponse {
            decision,
            applied: resolution_from_events(&self.state, events),
        };
        serde_json::to_string(&response).map_err(serde_to_js_error)
    }

    /// 停顿 `delay_ms`（默认取配置中的 500ms）后给出电脑的决策，不修改棋局。
    pub fn think_ai(&self, delay_ms: Option<u32>) -> Promise {
        let board = self.state.board;
        let config = self.agent.config().clone();
        let delay = delay_ms.unwrap_or(config.think_delay.as_millis() as u32);

        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let mut agent = AiAgent::new(config);
            let decision = agent.decide(&board).map_err(to_js_error)?;
            let json = serde_json::to_string(&decision).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }

    pub fn restart(&mut self) -> Result<String, JsValue> {
        let events = RuleEngine::new().restart(&mut self.state);
        make_resolution_json(resolution_from_events(&self.state, events))
    }
}

#[wasm_bindgen(js_name = "newBoard")]
pub fn new_board() -> Result<JsValue, JsValue> {
    to_value(&Board::new()).map_err(JsValue::from)
}

/// 在棋盘副本上落子并返回新棋盘；原棋盘不变。
#[wasm_bindgen(js_name = "place")]
pub fn place(board: JsValue, mv: JsValue, mark: JsValue) -> Result<JsValue, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    let mv: Move = from_value(mv).map_err(JsValue::from)?;
    let player: Player = from_value(mark).map_err(JsValue::from)?;
    match board.place(mv, player) {
        Ok(next) => to_value(&next).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "winner")]
pub fn winner(board: JsValue) -> Result<JsValue, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    to_value(&board.winner()).map_err(JsValue::from)
}

/// 获胜连线，供前端高亮。
#[wasm_bindgen(js_name = "winningLine")]
pub fn winning_line(board: JsValue) -> Result<JsValue, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    to_value(&board.winning_line().map(|(_, line)| line)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "isFull")]
pub fn is_full(board: JsValue) -> Result<bool, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    Ok(board.is_full())
}

#[wasm_bindgen(js_name = "availableMoves")]
pub fn available_moves(board: JsValue) -> Result<JsValue, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    to_value(&board.available_moves()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "gameOutcome")]
pub fn game_outcome(board: JsValue) -> Result<JsValue, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    to_value(&board.outcome()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateBoard")]
pub fn validate_board(board: JsValue) -> Result<(), JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    board
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))
}

/// 为电脑（O）选择落子。传入 `seed` 时随机难度可复现。
#[wasm_bindgen(js_name = "decideMove")]
pub fn decide_move_js(
    board: JsValue,
    difficulty: Option<String>,
    seed: Option<u32>,
) -> Result<JsValue, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    let difficulty = parse_difficulty(difficulty.as_deref()).map_err(to_js_error)?;
    let mut rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(u64::from(seed)),
        None => SmallRng::from_entropy(),
    };
    match decide_move(&board, difficulty, &mut rng) {
        Ok(mv) => to_value(&mv).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_strings_from_the_page_are_understood() {
        assert_eq!(parse_mode(Some("two-player"), None), Ok(GameMode::TwoPlayer));
        assert_eq!(parse_mode(None, Some("2")), Ok(GameMode::TwoPlayer));
        assert_eq!(
            parse_mode(Some("computer-player"), Some("2")),
            Ok(GameMode::VsComputer {
                difficulty: AiDifficulty::Hard,
            })
        );
        assert_eq!(
            parse_mode(Some("Computer"), None),
            Ok(GameMode::VsComputer {
                difficulty: AiDifficulty::Easy,
            })
        );
    }

    #[test]
    fn unknown_difficulty_is_rejected() {
        assert_eq!(
            parse_difficulty(Some("hrad")),
            Err(RuleError::InvalidDifficulty {
                value: "hrad".into(),
            })
        );
        assert_eq!(
            parse_mode(Some("computer"), Some("3")),
            Err(RuleError::InvalidDifficulty { value: "3".into() })
        );
        assert_eq!(parse_difficulty(None), Ok(AiDifficulty::Easy));
        // 双人模式不使用难度，原样忽略。
        assert_eq!(parse_mode(Some("two-player"), Some("hrad")), Ok(GameMode::TwoPlayer));
    }

    #[test]
    fn two_player_game_has_no_computer_move() {
        let mut engine =
            GameEngine::new(Some("two-player".into()), None).expect("two-player mode is valid");
        engine.play(0, 0).expect("cell is free");

        assert_eq!(
            ensure_computer_turn(&engine.state),
            Err(RuleError::NoComputerOpponent)
        );
    }

    #[test]
    fn computer_move_waits_for_o() {
        let engine = GameEngine::new(Some("computer".into()), Some("easy".into()))
            .expect("difficulty is valid");

        assert_eq!(
            ensure_computer_turn(&engine.state),
            Err(RuleError::NotPlayerTurn {
                expected: Player::X,
                actual: Player::O,
            })
        );
    }

    #[test]
    fn engine_alternates_human_and_computer() {
        let mut engine = GameEngine::new(Some("computer".into()), Some("hard".into()))
            .expect("difficulty is valid");
        assert!(!engine.is_computer_turn());

        engine.play(1, 1).expect("center is free");
        assert!(engine.is_computer_turn());

        engine.apply_ai_move().expect("computer has a move");
        assert_eq!(engine.state.board.get(Move::new(0, 0)), Some(Mark::O));
        assert!(!engine.is_computer_turn());
    }

    #[test]
    fn restart_resets_the_session() {
        let mut engine =
            GameEngine::new(Some("two-player".into()), None).expect("two-player mode is valid");
        engine.play(0, 0).expect("cell is free");
        engine.play(1, 1).expect("cell is free");

        engine.restart().expect("restart always succeeds");

        assert_eq!(engine.state.board, Board::new());
        assert_eq!(engine.state.current_player, Player::X);
        assert_eq!(engine.state.mode, GameMode::TwoPlayer);
    }
}
