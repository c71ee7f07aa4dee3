use std::str::FromStr;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::console_log;
use crate::game::{Board, Move, Player, RuleError};

/// 电脑固定执 O。
const COMPUTER: Player = Player::O;
/// 前端展示电脑落子前的停顿。
const DEFAULT_THINK_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiStrategy {
    Random,
    Minimax,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    #[default]
    Easy,
    Hard,
}

impl FromStr for AiDifficulty {
    type Err = RuleError;

    /// 页面上的难度按钮传 `data-level`（1 或 2），也接受名称。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" | "1" | "random" => Ok(AiDifficulty::Easy),
            "hard" | "2" | "minimax" => Ok(AiDifficulty::Hard),
            _ => Err(RuleError::InvalidDifficulty {
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub difficulty: AiDifficulty,
    pub strategy: AiStrategy,
    pub think_delay: Duration,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        let strategy = match difficulty {
            AiDifficulty::Easy => AiStrategy::Random,
            AiDifficulty::Hard => AiStrategy::Minimax,
        };
        Self {
            difficulty,
            strategy,
            think_delay: DEFAULT_THINK_DELAY,
        }
    }

    pub fn with_think_delay(mut self, think_delay: Duration) -> Self {
        self.think_delay = think_delay;
        self
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiDecision {
    pub action: Move,
    /// 极小化极大评分（O 胜 +1，平 0，X 胜 -1）；随机策略不评估。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<i8>,
    pub depth_reached: u8,
    pub nodes: u64,
    pub strategy: AiStrategy,
}

struct SearchStats {
    nodes: u64,
    depth_reached: u8,
}

impl SearchStats {
    fn new() -> Self {
        Self {
            nodes: 0,
            depth_reached: 0,
        }
    }
}

pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// 为 O 选择下一步。棋盘已满时返回 [`RuleError::NoMovesAvailable`]。
    pub fn decide(&mut self, board: &Board) -> Result<AiDecision, RuleError> {
        let strategy = self.config.strategy;
        let decision = match strategy {
            AiStrategy::Random => AiDecision {
                action: random_move(board, &mut self.rng)?,
                evaluation: None,
                depth_reached: 1,
                nodes: 1,
                strategy,
            },
            AiStrategy::Minimax => {
                let mut stats = SearchStats::new();
                let (action, score) = best_move(board, &mut stats)?;
                AiDecision {
                    action,
                    evaluation: Some(score),
                    depth_reached: stats.depth_reached,
                    nodes: stats.nodes,
                    strategy,
                }
            }
        };

        console_log!(
            "ai {:?} chose ({}, {}) after {} nodes",
            strategy,
            decision.action.row,
            decision.action.col,
            decision.nodes
        );
        Ok(decision)
    }
}

/// 按难度为 O 选择落子；随机源由调用方注入。
pub fn decide_move<R: Rng + ?Sized>(
    board: &Board,
    difficulty: AiDifficulty,
    rng: &mut R,
) -> Result<Move, RuleError> {
    match difficulty {
        AiDifficulty::Easy => random_move(board, rng),
        AiDifficulty::Hard => best_move(board, &mut SearchStats::new()).map(|(mv, _)| mv),
    }
}

/// 从 O 的视角对 `board` 做完整的极小化极大评估。
/// `maximizing` 为 true 表示轮到 O。
pub fn minimax(board: &Board, maximizing: bool) -> i8 {
    minimax_rec(board, maximizing, 0, &mut SearchStats::new())
}

fn random_move<R: Rng + ?Sized>(board: &Board, rng: &mut R) -> Result<Move, RuleError> {
    board
        .available_moves()
        .choose(rng)
        .copied()
        .ok_or(RuleError::NoMovesAvailable)
}

fn best_move(board: &Board, stats: &mut SearchStats) -> Result<(Move, i8), RuleError> {
    let mut best: Option<(Move, i8)> = None;

    for mv in board.available_moves() {
        let child = speculate(board, mv, COMPUTER);
        let score = minimax_rec(&child, false, 1, stats);
        // 同分保留先找到的落子
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((mv, score));
        }
    }

    best.ok_or(RuleError::NoMovesAvailable)
}

fn minimax_rec(board: &Board, maximizing: bool, depth: u8, stats: &mut SearchStats) -> i8 {
    stats.nodes += 1;
    if depth > stats.depth_reached {
        stats.depth_reached = depth;
    }

    if let Some(winner) = board.winner() {
        return terminal_score(winner);
    }
    if board.is_full() {
        return 0;
    }

    if maximizing {
        let mut value = i8::MIN;
        for mv in board.available_moves() {
            let score = minimax_rec(&speculate(board, mv, Player::O), false, depth + 1, stats);
            value = value.max(score);
        }
        value
    } else {
        let mut value = i8::MAX;
        for mv in board.available_moves() {
            let score = minimax_rec(&speculate(board, mv, Player::X), true, depth + 1, stats);
            value = value.min(score);
        }
        value
    }
}

fn terminal_score(winner: Player) -> i8 {
    match winner {
        Player::O => 1,
        Player::X => -1,
    }
}

/// 在副本上试探落子。`mv` 必须来自 `available_moves`。
fn speculate(board: &Board, mv: Move, player: Player) -> Board {
    match board.place(mv, player) {
        Ok(next) => next,
        Err(err) => panic!("speculative placement rejected on\n{board}\n{err}"),
    }
}
