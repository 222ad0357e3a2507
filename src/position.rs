//! Immutable bitboard representation of a Connect 4 position

use std::fmt;

use crate::error::{EngineError, Result};
use crate::{HEIGHT, WIDTH};

pub(crate) mod static_masks {
    use crate::{HEIGHT, WIDTH};

    pub const fn bottom_mask() -> u64 {
        let mut mask = 0;
        let mut column = 0;
        while column < WIDTH {
            mask |= 1 << (column * (HEIGHT + 1));
            column += 1;
        }
        mask
    }
    pub const fn full_board_mask() -> u64 {
        bottom_mask() * ((1 << HEIGHT as u64) - 1)
    }
}

// bit 63 is never used by the board itself
const SIDE_TWO_KEY_BIT: u64 = 1 << 63;

/// One of the two players. `One` moves first on an empty board
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    One,
    Two,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::One => Side::Two,
            Side::Two => Side::One,
        }
    }

    /// The cell value used for this side in raw grids (`1` or `2`)
    pub fn number(self) -> u8 {
        match self {
            Side::One => 1,
            Side::Two => 2,
        }
    }

    pub fn from_number(number: i64) -> Result<Self> {
        match number {
            1 => Ok(Side::One),
            2 => Ok(Side::Two),
            other => Err(EngineError::InvalidPlayer(other)),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player {}", self.number())
    }
}

/// Outcome of a finished game
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GameResult {
    Win(Side),
    Draw,
}

/// A Connect 4 position
///
/// Positions are never mutated: [`Position::play`] returns a new value, so a
/// position can be shared freely and used as a cache key. Two different move
/// orders reaching the same grid produce equal positions with equal keys.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    // mask of the side to move's tiles
    player_mask: u64,
    // mask of all tiles
    board_mask: u64,
    num_moves: usize,
    side_to_move: Side,
    result: Option<GameResult>,
}

impl Position {
    /// The empty board with `Side::One` to move
    pub fn new() -> Self {
        Self {
            player_mask: 0,
            board_mask: 0,
            num_moves: 0,
            side_to_move: Side::One,
            result: None,
        }
    }

    /// Builds a position from a string of 1-indexed columns, e.g. `"4453"`
    pub fn from_moves<S: AsRef<str>>(moves: S) -> Result<Self> {
        let mut position = Self::new();

        for column_char in moves.as_ref().chars() {
            match column_char.to_digit(10).map(|c| c as usize) {
                Some(column @ 1..=WIDTH) => {
                    // abort if the position is already decided
                    if position.is_terminal() {
                        return Err(EngineError::InvalidBoard(format!(
                            "game is over before move {}",
                            column
                        )));
                    }
                    position = position.play(column - 1)?;
                }
                _ => {
                    return Err(EngineError::InvalidBoard(format!(
                        "could not parse '{}' as a valid move",
                        column_char
                    )))
                }
            }
        }
        Ok(position)
    }

    /// Builds a position from a raw grid
    ///
    /// Row 0 is the top of the board. Cells hold `0` for empty, `1` for
    /// `Side::One` and `2` for `Side::Two`. Floating pieces are rejected.
    pub fn from_grid(grid: &[[u8; WIDTH]; HEIGHT], side_to_move: Side) -> Result<Self> {
        let mut one_mask = 0u64;
        let mut two_mask = 0u64;

        for column in 0..WIDTH {
            let mut open = false;
            // walk the column bottom up
            for row_from_bottom in 0..HEIGHT {
                let cell = grid[HEIGHT - 1 - row_from_bottom][column];
                let bit = 1u64 << (column * (HEIGHT + 1) + row_from_bottom);
                match cell {
                    0 => open = true,
                    1 | 2 if open => {
                        return Err(EngineError::InvalidBoard(format!(
                            "floating piece in column {}",
                            column
                        )))
                    }
                    1 => one_mask |= bit,
                    2 => two_mask |= bit,
                    other => {
                        return Err(EngineError::InvalidBoard(format!(
                            "unknown cell value {}",
                            other
                        )))
                    }
                }
            }
        }

        let board_mask = one_mask | two_mask;
        let result = match (Self::has_alignment(one_mask), Self::has_alignment(two_mask)) {
            (true, true) => {
                return Err(EngineError::InvalidBoard(
                    "both sides have four in a row".to_string(),
                ))
            }
            (true, false) => Some(GameResult::Win(Side::One)),
            (false, true) => Some(GameResult::Win(Side::Two)),
            (false, false) if board_mask == static_masks::full_board_mask() => {
                Some(GameResult::Draw)
            }
            (false, false) => None,
        };

        Ok(Self {
            player_mask: match side_to_move {
                Side::One => one_mask,
                Side::Two => two_mask,
            },
            board_mask,
            num_moves: board_mask.count_ones() as usize,
            side_to_move,
            result,
        })
    }

    /// Mask of the tiles owned by `side`
    pub fn mask_of(&self, side: Side) -> u64 {
        if side == self.side_to_move {
            self.player_mask
        } else {
            self.player_mask ^ self.board_mask
        }
    }

    pub fn top_mask(column: usize) -> u64 {
        1 << (column * (HEIGHT + 1) + (HEIGHT - 1))
    }

    pub fn bottom_mask(column: usize) -> u64 {
        1 << (column * (HEIGHT + 1))
    }

    pub fn column_mask(column: usize) -> u64 {
        ((1 << HEIGHT) - 1) << (column * (HEIGHT + 1))
    }

    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    pub fn num_moves(&self) -> usize {
        self.num_moves
    }

    pub fn is_full(&self) -> bool {
        self.board_mask == static_masks::full_board_mask()
    }

    pub fn is_terminal(&self) -> bool {
        self.result.is_some()
    }

    /// The outcome, once the position is terminal
    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    pub fn winner(&self) -> Option<Side> {
        match self.result {
            Some(GameResult::Win(side)) => Some(side),
            _ => None,
        }
    }

    /// The occupant of a cell, with row 0 at the top of the board
    pub fn cell(&self, row: usize, column: usize) -> Option<Side> {
        if row >= HEIGHT || column >= WIDTH {
            return None;
        }
        let bit = 1u64 << (column * (HEIGHT + 1) + (HEIGHT - 1 - row));
        if self.board_mask & bit == 0 {
            None
        } else if self.player_mask & bit != 0 {
            Some(self.side_to_move)
        } else {
            Some(self.side_to_move.opponent())
        }
    }

    pub fn playable(&self, column: usize) -> bool {
        column < WIDTH && Self::top_mask(column) & self.board_mask == 0
    }

    /// Columns with an open top cell, in ascending order
    pub fn legal_moves(&self) -> Vec<usize> {
        (0..WIDTH).filter(|&column| self.playable(column)).collect()
    }

    /// Bitmap of the cell a piece dropped in `column` would land on
    fn move_bitmap(&self, column: usize) -> u64 {
        (self.board_mask + Self::bottom_mask(column)) & Self::column_mask(column)
    }

    /// Drops a piece for the side to move into `column`
    pub fn play(&self, column: usize) -> Result<Self> {
        if column >= WIDTH {
            return Err(EngineError::InvalidMove {
                column,
                reason: "is out of range",
            });
        }
        if !self.playable(column) {
            return Err(EngineError::InvalidMove {
                column,
                reason: "is full",
            });
        }
        Ok(self.play_unchecked(column))
    }

    /// Drops a piece in a column already known to be playable
    pub(crate) fn play_unchecked(&self, column: usize) -> Self {
        let move_bitmap = self.move_bitmap(column);
        let won = Self::has_alignment(self.player_mask | move_bitmap);

        // switch the current player
        let player_mask = self.player_mask ^ self.board_mask;
        // add a cell of the previous player to the correct column
        let board_mask = self.board_mask | move_bitmap;

        let result = self.result.or_else(|| {
            if won {
                Some(GameResult::Win(self.side_to_move))
            } else if board_mask == static_masks::full_board_mask() {
                Some(GameResult::Draw)
            } else {
                None
            }
        });

        Self {
            player_mask,
            board_mask,
            num_moves: self.num_moves + 1,
            side_to_move: self.side_to_move.opponent(),
            result,
        }
    }

    /// Bitmap of the open cells directly playable this turn
    pub fn possible_moves(&self) -> u64 {
        (self.board_mask + static_masks::bottom_mask()) & static_masks::full_board_mask()
    }

    /// Columns where `side` would complete four in a row with its next drop
    pub fn winning_moves(&self, side: Side) -> Vec<usize> {
        let wins = self.winning_positions(self.mask_of(side)) & self.possible_moves();
        (0..WIDTH)
            .filter(|&column| wins & Self::column_mask(column) != 0)
            .collect()
    }

    /// Whether the side to move wins by dropping into `column`
    pub fn check_winning_move(&self, column: usize) -> bool {
        self.playable(column) && Self::has_alignment(self.player_mask | self.move_bitmap(column))
    }

    // create a bitmap of open squares that complete alignments for the owner of `player_mask`
    fn winning_positions(&self, player_mask: u64) -> u64 {
        // vertical
        // find the top ends of 3-alignemnts
        let mut r = (player_mask << 1) & (player_mask << 2) & (player_mask << 3);

        // horizontal
        let mut p = (player_mask << (HEIGHT + 1)) & (player_mask << (2 * (HEIGHT + 1)));
        // find the right ends of 3-alignments
        r |= p & (player_mask << (3 * (HEIGHT + 1)));
        // find holes of the type ...O O _ O...
        r |= p & (player_mask >> (HEIGHT + 1));

        p = (player_mask >> (HEIGHT + 1)) & (player_mask >> (2 * (HEIGHT + 1)));
        // find the left ends of 3-alignments
        r |= p & (player_mask >> (3 * (HEIGHT + 1)));
        // find holes of the type ...O _ O O...
        r |= p & (player_mask << (HEIGHT + 1));

        // diagonal /
        p = (player_mask << HEIGHT) & (player_mask << (2 * HEIGHT));
        r |= p & (player_mask << (3 * HEIGHT));
        r |= p & (player_mask >> HEIGHT);

        p = (player_mask >> HEIGHT) & (player_mask >> (2 * HEIGHT));
        r |= p & (player_mask >> (3 * HEIGHT));
        r |= p & (player_mask << HEIGHT);

        // diagonal \
        p = (player_mask << (HEIGHT + 2)) & (player_mask << (2 * (HEIGHT + 2)));
        r |= p & (player_mask << (3 * (HEIGHT + 2)));
        r |= p & (player_mask >> (HEIGHT + 2));

        p = (player_mask >> (HEIGHT + 2)) & (player_mask >> (2 * (HEIGHT + 2)));
        r |= p & (player_mask >> (3 * (HEIGHT + 2)));
        r |= p & (player_mask << (HEIGHT + 2));

        r & (static_masks::full_board_mask() ^ self.board_mask)
    }

    /// Whether `pos` contains four aligned tiles in any direction
    pub(crate) fn has_alignment(pos: u64) -> bool {
        // horizontal, both diagonals, vertical
        [HEIGHT + 1, HEIGHT, HEIGHT + 2, 1].iter().any(|&shift| {
            // mark all runs of 2, then look for two runs of 2 back to back
            let m = pos & (pos >> shift);
            m & (m >> (2 * shift)) != 0
        })
    }

    /// Key for the transposition and node tables
    ///
    /// Unique per grid and side to move.
    pub fn key(&self) -> u64 {
        let key = self.player_mask + self.board_mask;
        match self.side_to_move {
            Side::One => key,
            Side::Two => key | SIDE_TWO_KEY_BIT,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..HEIGHT {
            for column in 0..WIDTH {
                let symbol = match self.cell(row, column) {
                    Some(Side::One) => 'X',
                    Some(Side::Two) => 'O',
                    None => '.',
                };
                write!(f, "{}", symbol)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
