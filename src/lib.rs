//! A move engine for an AI opponent in the board game 'Connect 4'
//!
//! Two interchangeable searches pick a column within a time budget: an
//! iterative-deepening negamax with alpha-beta pruning and a heuristic
//! evaluator, and a Monte-Carlo tree search over a transposition-aware node
//! table. A [`MoveSelector`] drives either one for a game and always returns
//! a legal column.
//!
//! # Basic Usage
//!
//! ```
//! use connect4_engine::{negamax::Negamax, config::NegamaxConfig, Position};
//! use std::time::Duration;
//!
//!# use std::error::Error;
//!# fn main() -> Result<(), Box<dyn Error>> {
//! // player 1 threatens to complete the bottom row at column 0 or 4
//! // (move strings are 1-indexed, columns are 0-indexed)
//! let position = Position::from_moves("27374")?;
//! let report = Negamax::new(position, NegamaxConfig::default())
//!     .search(Duration::from_millis(200))?;
//!
//! assert!(report.tactical);
//! assert_eq!(report.best_move, 4);
//!# Ok(())
//!# }
//! ```

use static_assertions::*;

pub mod error;

pub mod position;

pub mod evaluation;

pub mod transposition_table;

pub mod negamax;

pub mod mcts;

pub mod config;

pub mod selector;

pub mod api;

mod test;

pub use config::{EngineConfig, EngineKind};
pub use error::EngineError;
pub use position::{GameResult, Position, Side};
pub use selector::{Decision, MoveSelector};

/// The width of the game board in tiles
pub const WIDTH: usize = 7;

/// The height of the game board in tiles
pub const HEIGHT: usize = 6;

// ensure that the given dimensions fit in a u64 for the bitboard representation,
// with the top bit left free for the side to move in position keys
const_assert!(WIDTH * (HEIGHT + 1) < 63);

/// The deterministic default move: the center column if legal, else the first legal column
pub fn fallback_move(legal_moves: &[usize]) -> Option<usize> {
    let center = WIDTH / 2;
    if legal_moves.contains(&center) {
        Some(center)
    } else {
        legal_moves.first().copied()
    }
}
