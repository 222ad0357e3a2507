//! Request and response types of the move endpoint
//!
//! Side numbering: board cells and `current_player` both use `1` for
//! `Side::One` (first to move, maximizing side of the tree search) and `2` for
//! `Side::Two`; `0` is an empty cell. Row 0 of `board` is the top row.
//!
//! The only error [`respond`] returns is [`EngineError::NoLegalMoves`]. Any
//! other failure is logged and answered with the fallback column.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use crate::error::{EngineError, Result};
use crate::fallback_move;
use crate::position::{Position, Side};
use crate::selector::MoveSelector;
use crate::{HEIGHT, WIDTH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub board: Vec<Vec<i64>>,
    pub current_player: i64,
    pub valid_moves: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveResponse {
    #[serde(rename = "move")]
    pub column: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    /// Seconds spent on the decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
}

impl MoveRequest {
    /// In-range columns of `valid_moves`, ascending and without duplicates
    pub fn legal_moves(&self) -> Vec<usize> {
        let mut columns: Vec<usize> = self
            .valid_moves
            .iter()
            .filter(|&&column| column >= 0 && column < WIDTH as i64)
            .map(|&column| column as usize)
            .collect();
        columns.sort_unstable();
        columns.dedup();
        columns
    }

    pub fn position(&self) -> Result<Position> {
        if self.board.len() != HEIGHT {
            return Err(EngineError::InvalidBoard(format!(
                "expected {} rows, got {}",
                HEIGHT,
                self.board.len()
            )));
        }

        let mut grid = [[0u8; WIDTH]; HEIGHT];
        for (row, cells) in self.board.iter().enumerate() {
            if cells.len() != WIDTH {
                return Err(EngineError::InvalidBoard(format!(
                    "expected {} columns in row {}, got {}",
                    WIDTH,
                    row,
                    cells.len()
                )));
            }
            for (column, &cell) in cells.iter().enumerate() {
                grid[row][column] = match cell {
                    0..=2 => cell as u8,
                    other => {
                        return Err(EngineError::InvalidBoard(format!(
                            "unknown cell value {} at row {}, column {}",
                            other, row, column
                        )))
                    }
                };
            }
        }

        Position::from_grid(&grid, Side::from_number(self.current_player)?)
    }
}

/// Answers one move request
pub fn respond(selector: &mut MoveSelector, request: &MoveRequest) -> Result<MoveResponse> {
    let start = Instant::now();
    let legal_moves = request.legal_moves();
    let default_move = fallback_move(&legal_moves).ok_or(EngineError::NoLegalMoves)?;

    let decision = catch_unwind(AssertUnwindSafe(|| {
        request
            .position()
            .and_then(|position| selector.choose(&position, &legal_moves))
    }))
    .unwrap_or_else(|_| {
        error!("engine panicked");
        Err(EngineError::Internal("engine panicked".to_string()))
    });

    match decision {
        Ok(decision) => Ok(MoveResponse {
            column: decision.column,
            evaluation: decision.score,
            depth: decision.depth,
            execution_time: Some(decision.elapsed.as_secs_f64()),
        }),
        Err(err) => {
            warn!(error = %err, column = default_move, "falling back to default move");
            Ok(MoveResponse {
                column: default_move,
                evaluation: None,
                depth: None,
                execution_time: Some(start.elapsed().as_secs_f64()),
            })
        }
    }
}
