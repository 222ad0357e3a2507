//! Orchestration of one game's decisions
//!
//! The selector owns the session context (configuration, the number of moves
//! the AI has made, the random source). Search caches are created fresh for
//! every decision and dropped once the column is chosen.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use std::time::{Duration, Instant};

use crate::config::{BudgetStep, EngineConfig, EngineKind};
use crate::error::{EngineError, Result};
use crate::fallback_move;
use crate::mcts::Mcts;
use crate::negamax::Negamax;
use crate::position::Position;

/// The column chosen for one turn, with diagnostics
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub column: usize,
    pub engine: EngineKind,
    /// Negamax score for the side to move, or MCTS mean reward for `Side::One`
    pub score: Option<f64>,
    /// Deepest completed negamax iteration
    pub depth: Option<u32>,
    pub elapsed: Duration,
    /// The engine's answer was replaced by the fallback column
    pub fallback: bool,
}

pub struct MoveSelector {
    config: EngineConfig,
    ai_moves_made: u32,
    rng: ChaCha8Rng,
}

impl MoveSelector {
    pub fn new(config: EngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            ai_moves_made: 0,
            rng,
        }
    }

    pub fn ai_moves_made(&self) -> u32 {
        self.ai_moves_made
    }

    /// Starts a new game
    pub fn reset(&mut self) {
        self.ai_moves_made = 0;
    }

    /// Chooses a column of `legal_moves` for `position`
    ///
    /// Fails only when `legal_moves` is empty. Engine failures and answers
    /// outside `legal_moves` are replaced by the center column, else the first
    /// legal column.
    pub fn choose(&mut self, position: &Position, legal_moves: &[usize]) -> Result<Decision> {
        let start = Instant::now();
        let default_move = fallback_move(legal_moves).ok_or(EngineError::NoLegalMoves)?;

        // an empty or single-piece board starts a new game
        if position.num_moves() <= 1 && self.ai_moves_made > 0 {
            debug!("new game detected, resetting move count");
            self.reset();
        }

        let budget = self.config.budget_for(self.ai_moves_made);
        debug!(
            engine = ?self.config.engine,
            ai_moves_made = self.ai_moves_made,
            time_ms = budget.time_ms,
            "choosing move"
        );
        let outcome = self.run_engine(position, &budget);
        self.ai_moves_made += 1;

        let decision = match outcome {
            Ok(decision) if legal_moves.contains(&decision.column) => decision,
            Ok(decision) => {
                let err = EngineError::EngineReturnedIllegalMove {
                    column: decision.column,
                };
                warn!(error = %err, column = default_move, "substituting fallback move");
                Decision {
                    column: default_move,
                    fallback: true,
                    ..decision
                }
            }
            Err(err) => {
                warn!(error = %err, column = default_move, "engine failed, substituting fallback move");
                Decision {
                    column: default_move,
                    engine: self.config.engine,
                    score: None,
                    depth: None,
                    elapsed: start.elapsed(),
                    fallback: true,
                }
            }
        };
        Ok(decision)
    }

    fn run_engine(&mut self, position: &Position, budget: &BudgetStep) -> Result<Decision> {
        match self.config.engine {
            EngineKind::Negamax => {
                let mut config = self.config.negamax.clone();
                if let Some(max_depth) = budget.max_depth {
                    config.max_depth = max_depth;
                }
                let report = Negamax::new(*position, config).search(budget.time_budget())?;
                Ok(Decision {
                    column: report.best_move,
                    engine: EngineKind::Negamax,
                    score: Some(report.score as f64),
                    depth: Some(report.depth),
                    elapsed: report.elapsed,
                    fallback: false,
                })
            }
            EngineKind::Mcts => {
                let mut mcts = Mcts::new(*position, self.config.mcts.clone(), &mut self.rng);
                let stats = mcts.search(budget.time_budget())?;
                Ok(Decision {
                    column: stats.best_move,
                    engine: EngineKind::Mcts,
                    score: Some(stats.value),
                    depth: None,
                    elapsed: stats.elapsed,
                    fallback: false,
                })
            }
        }
    }
}
