use serde::{Deserialize, Serialize};
use std::fmt;

use super::state::{GameEvent, GameOutcome, GameState, IntegrityError, Move, Player};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaceAction {
    pub player: Player,
    pub row: usize,
    pub col: usize,
}

impl PlaceAction {
    pub fn new(player: Player, mv: Move) -> Self {
        Self {
            player,
            row: mv.row,
            col: mv.col,
        }
    }

    pub fn target(&self) -> Move {
        Move::new(self.row, self.col)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleError {
    InvalidMove {
        row: usize,
        col: usize,
    },
    NoMovesAvailable,
    GameFinished,
    NotPlayerTurn {
        expected: Player,
        actual: Player,
    },
    IntegrityViolation {
        error: IntegrityError,
    },
    InvalidDifficulty {
        value: String,
    },
    NoComputerOpponent,
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::InvalidMove { row, col } => {
                write!(f, "cell ({row}, {col}) is occupied or out of range")
            }
            RuleError::NoMovesAvailable => write!(f, "no empty cells left on the board"),
            RuleError::GameFinished => write!(f, "the game is already over"),
            RuleError::NotPlayerTurn { expected, actual } => {
                write!(f, "it is {expected}'s turn, not {actual}'s")
            }
            RuleError::IntegrityViolation { error } => {
                write!(f, "board failed integrity check: {error:?}")
            }
            RuleError::InvalidDifficulty { value } => {
                write!(f, "unknown difficulty {value:?}, expected easy/1 or hard/2")
            }
            RuleError::NoComputerOpponent => {
                write!(f, "two-player games have no computer opponent")
            }
        }
    }
}

impl std::error::Error for RuleError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    pub outcome: GameOutcome,
}

impl RuleResolution {
    /// `events` 由 [`RuleEngine`] 产生，终局事件已包含在内。
    pub fn new(state: GameState, events: Vec<GameEvent>) -> Self {
        let outcome = state.outcome;
        Self {
            state,
            events,
            outcome,
        }
    }
}

/// 回合推进：校验、落子、判定胜负、交换先后手。
#[derive(Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    fn ensure_in_progress(state: &GameState) -> Result<(), RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        Ok(())
    }

    fn ensure_turn_owner(state: &GameState, player: Player) -> Result<(), RuleError> {
        if state.current_player != player {
            return Err(RuleError::NotPlayerTurn {
                expected: state.current_player,
                actual: player,
            });
        }
        Ok(())
    }

    fn ensure_integrity(state: &GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    pub fn place(
        &mut self,
        state: &mut GameState,
        action: PlaceAction,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_integrity(state)?;
        Self::ensure_in_progress(state)?;
        Self::ensure_turn_owner(state, action.player)?;

        let mv = action.target();
        state.board = state.board.place(mv, action.player)?;

        let mut events = vec![GameEvent::MarkPlaced {
            player: action.player,
            mv,
        }];
        events.extend(Self::check_outcome(state));
        if !state.is_finished() {
            state.end_turn();
        }

        for event in &events {
            state.record_event(event.clone());
        }
        Ok(events)
    }

    /// 重新评估胜负，返回新产生的终局事件。
    pub fn check_outcome(state: &mut GameState) -> Option<GameEvent> {
        match state.evaluate_outcome() {
            GameOutcome::Win { winner } => state
                .board
                .winning_line()
                .map(|(_, line)| GameEvent::GameWon { winner, line }),
            GameOutcome::Draw => Some(GameEvent::GameDrawn),
            GameOutcome::InProgress => None,
        }
    }

    pub fn restart(&mut self, state: &mut GameState) -> Vec<GameEvent> {
        state.reset();
        state.record_event(GameEvent::GameRestarted);
        vec![GameEvent::GameRestarted]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiDifficulty;
    use crate::game::state::{Board, GameMode, Mark};

    fn play(engine: &mut RuleEngine, state: &mut GameState, moves: &[(usize, usize)]) {
        for &(row, col) in moves {
            let player = state.current_player;
            engine
                .place(state, PlaceAction::new(player, Move::new(row, col)))
                .expect("scripted move should succeed");
        }
    }

    #[test]
    fn turns_alternate_starting_with_x() {
        let mut engine = RuleEngine::new();
        let mut state = GameState::new(GameMode::TwoPlayer);
        assert_eq!(state.current_player, Player::X);

        play(&mut engine, &mut state, &[(1, 1)]);
        assert_eq!(state.current_player, Player::O);
        assert_eq!(state.turn, 2);

        play(&mut engine, &mut state, &[(0, 0)]);
        assert_eq!(state.current_player, Player::X);
        assert_eq!(state.board.get(Move::new(0, 0)), Some(Mark::O));
    }

    #[test]
    fn wrong_player_is_rejected() {
        let mut engine = RuleEngine::new();
        let mut state = GameState::new(GameMode::TwoPlayer);

        let result = engine.place(&mut state, PlaceAction::new(Player::O, Move::new(0, 0)));

        assert_eq!(
            result,
            Err(RuleError::NotPlayerTurn {
                expected: Player::X,
                actual: Player::O,
            })
        );
        assert_eq!(state.board, Board::new());
    }

    #[test]
    fn occupied_cell_leaves_state_unchanged() {
        let mut engine = RuleEngine::new();
        let mut state = GameState::new(GameMode::TwoPlayer);
        play(&mut engine, &mut state, &[(1, 1)]);
        let before = state.clone();

        let result = engine.place(&mut state, PlaceAction::new(Player::O, Move::new(1, 1)));

        assert_eq!(result, Err(RuleError::InvalidMove { row: 1, col: 1 }));
        assert_eq!(state, before);
    }

    #[test]
    fn completing_a_line_wins_and_locks_the_game() {
        let mut engine = RuleEngine::new();
        let mut state = GameState::new(GameMode::TwoPlayer);
        play(&mut engine, &mut state, &[(0, 0), (1, 0), (0, 1), (1, 1)]);

        let events = engine
            .place(&mut state, PlaceAction::new(Player::X, Move::new(0, 2)))
            .expect("winning move should succeed");

        assert_eq!(state.outcome, GameOutcome::Win { winner: Player::X });
        assert!(events.iter().any(|event| matches!(
            event,
            GameEvent::GameWon {
                winner: Player::X,
                ..
            }
        )));
        assert_eq!(state.current_player, Player::X, "turn does not pass after a win");

        let result = engine.place(&mut state, PlaceAction::new(Player::X, Move::new(2, 2)));
        assert_eq!(result, Err(RuleError::GameFinished));
    }

    #[test]
    fn filling_the_board_without_a_line_is_a_draw() {
        let mut engine = RuleEngine::new();
        let mut state = GameState::new(GameMode::TwoPlayer);
        play(
            &mut engine,
            &mut state,
            &[(0, 0), (0, 1), (0, 2), (1, 1), (1, 0), (1, 2), (2, 1), (2, 0)],
        );

        let events = engine
            .place(&mut state, PlaceAction::new(Player::X, Move::new(2, 2)))
            .expect("last move should succeed");

        assert_eq!(state.outcome, GameOutcome::Draw);
        assert_eq!(events.last(), Some(&GameEvent::GameDrawn));
    }

    #[test]
    fn corrupted_state_is_rejected() {
        let mut engine = RuleEngine::new();
        let mut state = GameState::new(GameMode::TwoPlayer);
        state.board = Board::from_rows([
            [Mark::O, Mark::O, Mark::Empty],
            [Mark::Empty; 3],
            [Mark::Empty; 3],
        ]);

        let result = engine.place(&mut state, PlaceAction::new(Player::X, Move::new(2, 2)));

        assert_eq!(
            result,
            Err(RuleError::IntegrityViolation {
                error: IntegrityError::MarkCountMismatch { x: 0, o: 2 },
            })
        );
    }

    #[test]
    fn restart_clears_board_and_keeps_mode() {
        let mut engine = RuleEngine::new();
        let mode = GameMode::VsComputer {
            difficulty: AiDifficulty::Easy,
        };
        let mut state = GameState::new(mode);
        play(&mut engine, &mut state, &[(0, 0), (2, 2)]);

        let events = engine.restart(&mut state);

        assert_eq!(events, vec![GameEvent::GameRestarted]);
        assert_eq!(state.board, Board::new());
        assert_eq!(state.current_player, Player::X);
        assert_eq!(state.mode, mode);
        assert_eq!(state.event_log, vec![GameEvent::GameRestarted]);
    }

    #[test]
    fn resolution_reports_the_win_event_once() {
        let mut engine = RuleEngine::new();
        let mut state = GameState::new(GameMode::TwoPlayer);
        play(&mut engine, &mut state, &[(0, 0), (1, 0), (0, 1), (1, 1)]);

        let events = engine
            .place(&mut state, PlaceAction::new(Player::X, Move::new(0, 2)))
            .expect("winning move should succeed");
        let resolution = RuleResolution::new(state, events);

        assert_eq!(resolution.outcome, GameOutcome::Win { winner: Player::X });
        assert_eq!(
            resolution.events,
            vec![
                GameEvent::MarkPlaced {
                    player: Player::X,
                    mv: Move::new(0, 2),
                },
                GameEvent::GameWon {
                    winner: Player::X,
                    line: [Move::new(0, 0), Move::new(0, 1), Move::new(0, 2)],
                },
            ]
        );
    }

    #[test]
    fn difficulty_errors_describe_themselves() {
        let error = RuleError::InvalidDifficulty {
            value: "hrad".into(),
        };
        assert_eq!(
            error.to_string(),
            r#"unknown difficulty "hrad", expected easy/1 or hard/2"#
        );
        let json = serde_json::to_string(&RuleError::NoComputerOpponent)
            .expect("error should serialize");
        assert_eq!(json, r#"{"type":"NoComputerOpponent"}"#);
    }
}
