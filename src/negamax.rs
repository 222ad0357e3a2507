//! Time-bounded negamax search with alpha-beta pruning
//!
//! Before searching, the engine takes an immediate win or blocks an immediate
//! loss. Otherwise it deepens one ply at a time until the budget or the
//! configured maximum depth runs out, keeping the result of the deepest
//! completed iteration.

use tracing::{debug, warn};

use std::time::{Duration, Instant};

use crate::config::NegamaxConfig;
use crate::error::{EngineError, Result};
use crate::evaluation::{evaluate, BLOCK_THREE_SCORE, WIN_SCORE};
use crate::fallback_move;
use crate::position::{GameResult, Position};
use crate::transposition_table::TranspositionTable;
use crate::WIDTH;

const INFINITY: i32 = i32::MAX;

/// Ordering score of an immediately winning move
const WIN_ORDER_SCORE: i32 = 1_000_000;

struct MoveSorter {
    size: usize,
    // column and score
    moves: [(usize, i32); WIDTH],
}

impl MoveSorter {
    pub fn new() -> Self {
        Self {
            size: 0,
            moves: [(0, 0); WIDTH],
        }
    }
    pub fn push(&mut self, column: usize, score: i32) {
        let mut pos = self.size;
        self.size += 1;
        while pos != 0 && self.moves[pos - 1].1 > score {
            self.moves[pos] = self.moves[pos - 1];
            pos -= 1;
        }
        self.moves[pos] = (column, score);
    }
}
impl Iterator for MoveSorter {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        match self.size {
            0 => None,
            _ => {
                self.size -= 1;
                Some(self.moves[self.size].0)
            }
        }
    }
}

/// Returns a slice ordering the columns from the middle outwards, as
/// the middle columns are often better moves
pub const fn move_order() -> [usize; WIDTH] {
    let mut move_order = [0; WIDTH];
    let mut i = 0;
    while i < WIDTH {
        move_order[i] = (WIDTH / 2) + (i % 2) * (i / 2 + 1) - (1 - i % 2) * (i / 2);
        i += 1;
    }
    move_order
}

/// The column of `columns` closest to the center
pub fn center_most(columns: &[usize]) -> Option<usize> {
    move_order().iter().copied().find(|column| columns.contains(column))
}

/// Outcome of one decision
#[derive(Clone, Debug, PartialEq)]
pub struct SearchReport {
    pub best_move: usize,
    /// Score from the point of view of the side to move
    pub score: i32,
    /// Deepest completed iteration, 0 for tactical moves and fallbacks
    pub depth: u32,
    pub nodes: usize,
    pub elapsed: Duration,
    /// The move was an immediate win or block, no search was run
    pub tactical: bool,
}

/// A negamax searcher for a single decision
///
/// The transposition table lives and dies with the searcher, so nothing is
/// shared between decisions or games.
pub struct Negamax {
    root: Position,
    config: NegamaxConfig,
    transposition_table: Option<TranspositionTable>,
    deadline: Option<Instant>,

    /// The number of nodes searched so far (for diagnostics only)
    pub node_count: usize,
}

impl Negamax {
    pub fn new(root: Position, config: NegamaxConfig) -> Self {
        let transposition_table = if config.use_transposition_table {
            Some(TranspositionTable::with_capacity(config.table_capacity))
        } else {
            None
        };
        Self {
            root,
            config,
            transposition_table,
            deadline: None,
            node_count: 0,
        }
    }

    /// An immediate win for the side to move, else an immediate block
    pub fn tactical_move(position: &Position) -> Option<(usize, i32)> {
        let side = position.side_to_move();
        if let Some(column) = center_most(&position.winning_moves(side)) {
            return Some((column, WIN_SCORE));
        }
        center_most(&position.winning_moves(side.opponent()))
            .map(|column| (column, -BLOCK_THREE_SCORE))
    }

    /// Chooses a move within `time_budget`
    ///
    /// Fails only when the root has no legal move.
    pub fn search(&mut self, time_budget: Duration) -> Result<SearchReport> {
        let start = Instant::now();
        let legal_moves = self.root.legal_moves();
        let default_move = fallback_move(&legal_moves).ok_or(EngineError::NoLegalMoves)?;

        if let Some((column, score)) = Self::tactical_move(&self.root) {
            debug!(column, score, "tactical move, skipping search");
            return Ok(SearchReport {
                best_move: column,
                score,
                depth: 0,
                nodes: 0,
                elapsed: start.elapsed(),
                tactical: true,
            });
        }

        self.deadline = Some(start + time_budget);
        let root = self.root;
        let mut best: Option<(i32, usize, u32)> = None;

        for depth in 1..=self.config.max_depth {
            match self.negamax(&root, depth, -INFINITY, INFINITY) {
                Ok((score, Some(column))) => {
                    debug!(depth, column, score, nodes = self.node_count, "completed depth");
                    best = Some((score, column, depth));
                    // a forced win needs no deeper confirmation
                    if score >= WIN_SCORE / 2 {
                        break;
                    }
                }
                Ok((_, None)) => break,
                Err(EngineError::SearchAborted) => {
                    debug!(depth, "search aborted by time budget");
                    break;
                }
                Err(err) => return Err(err),
            }

            if start.elapsed().as_secs_f64() > time_budget.as_secs_f64() * self.config.soft_stop {
                break;
            }
        }
        self.deadline = None;

        let (score, best_move, depth) = best.unwrap_or_else(|| {
            warn!(column = default_move, "no depth completed, using default move");
            (0, default_move, 0)
        });

        Ok(SearchReport {
            best_move,
            score,
            depth,
            nodes: self.node_count,
            elapsed: start.elapsed(),
            tactical: false,
        })
    }

    /// Searches the root to exactly `depth` with no time limit and no tactical shortcut
    pub fn search_depth(&mut self, depth: u32) -> Result<(i32, Option<usize>)> {
        self.deadline = None;
        let root = self.root;
        self.negamax(&root, depth, -INFINITY, INFINITY)
    }

    /// Performs the game tree search
    ///
    /// Returns the score from the point of view of the side to move and the
    /// best move found, or `SearchAborted` once the deadline has passed.
    fn negamax(
        &mut self,
        position: &Position,
        depth: u32,
        mut alpha: i32,
        beta: i32,
    ) -> Result<(i32, Option<usize>)> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(EngineError::SearchAborted);
            }
        }
        self.node_count += 1;

        let key = position.key();
        if let Some(entry) = self.transposition_table.as_ref().and_then(|t| t.get(key)) {
            if entry.trusted_for(depth) {
                return Ok((entry.score, entry.best_move));
            }
        }

        match position.result() {
            Some(GameResult::Win(side)) if side == position.side_to_move() => {
                return Ok((WIN_SCORE, None))
            }
            Some(GameResult::Win(_)) => return Ok((-WIN_SCORE, None)),
            Some(GameResult::Draw) => return Ok((0, None)),
            None => {}
        }

        if depth == 0 {
            return Ok((evaluate(position, position.side_to_move()), None));
        }

        let alpha_orig = alpha;
        let mut best_score = -INFINITY;
        let mut best_move = None;

        for column in self.order_moves(position) {
            let child = position.play_unchecked(column);
            // the search window is flipped for the other player
            let (child_score, _) = self.negamax(&child, depth - 1, -beta, -alpha)?;
            let score = -child_score;

            if score > best_score {
                best_score = score;
                best_move = Some(column);
            }
            alpha = alpha.max(best_score);
            // a perfect opponent will not let us reach this branch
            if alpha >= beta {
                break;
            }
        }

        if best_move.is_none() {
            return Ok((0, None));
        }

        // scores on or outside the window are only bounds
        let exact = best_score > alpha_orig && best_score < beta;
        if let Some(table) = self.transposition_table.as_mut() {
            table.set(key, best_score, depth, best_move, exact);
        }
        Ok((best_score, best_move))
    }

    fn order_moves(&self, position: &Position) -> MoveSorter {
        let side = position.side_to_move();
        let wins = position.winning_moves(side);
        let blocks = position.winning_moves(side.opponent());

        let mut moves = MoveSorter::new();
        // reversing move order makes equal scores come out center first
        for &column in move_order().iter().rev() {
            if !position.playable(column) {
                continue;
            }
            let score = if wins.contains(&column) {
                WIN_ORDER_SCORE
            } else if !wins.is_empty() {
                0
            } else {
                Self::move_score(position, column, &blocks)
            };
            moves.push(column, score);
        }
        moves
    }

    /// Heuristic promise of dropping into `column`, used only for ordering
    fn move_score(position: &Position, column: usize, blocks: &[usize]) -> i32 {
        let side = position.side_to_move();
        let mut score = 0;

        if blocks.contains(&column) {
            score += 1_000;
        }

        let distance = (column as i32 - (WIDTH / 2) as i32).abs();
        score += (4 - distance.min(3)) * 10;

        let child = position.play_unchecked(column);
        score += evaluate(&child, side).div_euclid(1_000);

        // never hand the opponent a winning reply
        if !child.winning_moves(side.opponent()).is_empty() {
            score -= 500;
        }

        // set up a win on the following turn
        let follow_ups = child
            .winning_moves(side)
            .iter()
            .filter(|&&next| next != column)
            .count() as i32;
        score += follow_ups * 50;

        score
    }
}
