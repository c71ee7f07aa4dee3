use serde::{Deserialize, Serialize};
use std::fmt;

use super::rules::RuleError;
use crate::ai::AiDifficulty;

/// 棋盘边长。
pub const BOARD_SIDE: usize = 3;

/// 八条获胜连线：三行、三列、两条对角线。
const LINES: [[Move; 3]; 8] = [
    [Move::new(0, 0), Move::new(0, 1), Move::new(0, 2)],
    [Move::new(1, 0), Move::new(1, 1), Move::new(1, 2)],
    [Move::new(2, 0), Move::new(2, 1), Move::new(2, 2)],
    [Move::new(0, 0), Move::new(1, 0), Move::new(2, 0)],
    [Move::new(0, 1), Move::new(1, 1), Move::new(2, 1)],
    [Move::new(0, 2), Move::new(1, 2), Move::new(2, 2)],
    [Move::new(0, 0), Move::new(1, 1), Move::new(2, 2)],
    [Move::new(0, 2), Move::new(1, 1), Move::new(2, 0)],
];

/// 单元格内容，序列化为前端使用的 `""` / `"X"` / `"O"`。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Mark {
    #[default]
    #[serde(rename = "")]
    Empty,
    X,
    O,
}

impl Mark {
    pub fn player(self) -> Option<Player> {
        match self {
            Mark::Empty => None,
            Mark::X => Some(Player::X),
            Mark::O => Some(Player::O),
        }
    }
}

/// 玩家。单人模式下 X 为人类，O 为电脑。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Player {
    X,
    O,
}

impl Player {
    pub fn opponent(self) -> Player {
        match self {
            Player::X => Player::O,
            Player::O => Player::X,
        }
    }
}

impl From<Player> for Mark {
    fn from(player: Player) -> Self {
        match player {
            Player::X => Mark::X,
            Player::O => Mark::O,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::X => write!(f, "X"),
            Player::O => write!(f, "O"),
        }
    }
}

/// 落子坐标（行、列），取值范围 `[0, 2]`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Move {
    pub row: usize,
    pub col: usize,
}

impl Move {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn in_range(&self) -> bool {
        self.row < BOARD_SIDE && self.col < BOARD_SIDE
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameOutcome {
    #[default]
    InProgress,
    Win { winner: Player },
    Draw,
}

impl GameOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameOutcome::InProgress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    MarkCountMismatch { x: usize, o: usize },
    MultipleWinners,
}

/// 3x3 棋盘，按行优先存储。值类型，落子返回新棋盘。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Board {
    cells: [[Mark; BOARD_SIDE]; BOARD_SIDE],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(cells: [[Mark; BOARD_SIDE]; BOARD_SIDE]) -> Self {
        Self { cells }
    }

    pub fn rows(&self) -> &[[Mark; BOARD_SIDE]; BOARD_SIDE] {
        &self.cells
    }

    pub fn get(&self, mv: Move) -> Option<Mark> {
        if !mv.in_range() {
            return None;
        }
        Some(self.cells[mv.row][mv.col])
    }

    /// 在 `mv` 处写入 `player` 的标记。越界或已占用时返回
    /// [`RuleError::InvalidMove`]，原棋盘保持不变。
    pub fn place(&self, mv: Move, player: Player) -> Result<Board, RuleError> {
        match self.get(mv) {
            Some(Mark::Empty) => {
                let mut next = *self;
                next.cells[mv.row][mv.col] = player.into();
                Ok(next)
            }
            _ => Err(RuleError::InvalidMove {
                row: mv.row,
                col: mv.col,
            }),
        }
    }

    /// 所有空位，行优先顺序。搜索的平局裁决依赖这一顺序。
    pub fn available_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(BOARD_SIDE * BOARD_SIDE);
        for (row, cells) in self.cells.iter().enumerate() {
            for (col, &cell) in cells.iter().enumerate() {
                if cell == Mark::Empty {
                    moves.push(Move::new(row, col));
                }
            }
        }
        moves
    }

    pub fn is_full(&self) -> bool {
        self.cells
            .iter()
            .all(|row| row.iter().all(|&cell| cell != Mark::Empty))
    }

    pub fn count(&self, mark: Mark) -> usize {
        self.cells
            .iter()
            .flat_map(|row| row.iter())
            .filter(|&&cell| cell == mark)
            .count()
    }

    /// 所有已连成的线及其所属玩家。
    pub fn completed_lines(&self) -> impl Iterator<Item = (Player, [Move; 3])> + '_ {
        LINES.iter().filter_map(move |line| {
            let [a, b, c] = (*line).map(|mv| self.cells[mv.row][mv.col]);
            if a == b && b == c {
                a.player().map(|player| (player, *line))
            } else {
                None
            }
        })
    }

    pub fn winning_line(&self) -> Option<(Player, [Move; 3])> {
        self.completed_lines().next()
    }

    pub fn winner(&self) -> Option<Player> {
        self.winning_line().map(|(player, _)| player)
    }

    pub fn outcome(&self) -> GameOutcome {
        if let Some(winner) = self.winner() {
            GameOutcome::Win { winner }
        } else if self.is_full() {
            GameOutcome::Draw
        } else {
            GameOutcome::InProgress
        }
    }

    /// 校验棋盘是否可能由 X 先手、双方交替落子得到。
    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let x = self.count(Mark::X);
        let o = self.count(Mark::O);
        if x < o || x > o + 1 {
            return Err(IntegrityError::MarkCountMismatch { x, o });
        }

        let mut owners = self.completed_lines().map(|(player, _)| player);
        if let Some(first) = owners.next() {
            if owners.any(|player| player != first) {
                return Err(IntegrityError::MultipleWinners);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, row) in self.cells.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            for cell in row {
                let symbol = match cell {
                    Mark::Empty => '.',
                    Mark::X => 'X',
                    Mark::O => 'O',
                };
                write!(f, "{symbol}")?;
            }
        }
        Ok(())
    }
}

/// 对局模式，在一局开始前确定。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameMode {
    #[default]
    TwoPlayer,
    VsComputer { difficulty: AiDifficulty },
}

/// 游戏事件流，供前端渲染。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    MarkPlaced { player: Player, mv: Move },
    GameWon { winner: Player, line: [Move; 3] },
    GameDrawn,
    GameRestarted,
}

/// 一局游戏的完整状态，由会话控制器持有。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    pub board: Board,
    pub current_player: Player,
    #[serde(default)]
    pub mode: GameMode,
    pub turn: u32,
    #[serde(default)]
    pub outcome: GameOutcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
}

impl GameState {
    pub fn new(mode: GameMode) -> Self {
        Self {
            board: Board::new(),
            current_player: Player::X,
            mode,
            turn: 1,
            outcome: GameOutcome::InProgress,
            event_log: Vec::new(),
        }
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_terminal()
    }

    pub fn difficulty(&self) -> Option<AiDifficulty> {
        match self.mode {
            GameMode::TwoPlayer => None,
            GameMode::VsComputer { difficulty } => Some(difficulty),
        }
    }

    pub fn is_computer_turn(&self) -> bool {
        self.difficulty().is_some() && self.current_player == Player::O && !self.is_finished()
    }

    pub fn end_turn(&mut self) {
        self.current_player = self.current_player.opponent();
        self.turn += 1;
    }

    pub fn evaluate_outcome(&mut self) -> GameOutcome {
        self.outcome = self.board.outcome();
        self.outcome
    }

    /// 重开一局：清空棋盘与事件，保留对局模式。
    pub fn reset(&mut self) {
        *self = GameState::new(self.mode);
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        self.board.integrity_check()
    }
}

impl Default for GameState {
    fn default() -> Self {
        GameState::new(GameMode::default())
    }
}
