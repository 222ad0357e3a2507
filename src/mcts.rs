//! Monte-Carlo tree search over a table of positions
//!
//! Nodes live in an arena indexed by [`NodeId`] and are looked up by position
//! key, so move orders that transpose into the same board share one node. The
//! graph is therefore a DAG, and each node counts the visits that reached it
//! through every predecessor separately.
//!
//! Rewards are always measured from the point of view of `Side::One` (win 1,
//! draw 0.5, loss 0) and added unchanged to every node of a path. Instead of
//! flipping signs per ply, selection and the final decision maximize when
//! `Side::One` is to move and minimize when `Side::Two` is.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::MctsConfig;
use crate::error::{EngineError, Result};
use crate::position::{GameResult, Position, Side};

pub type NodeId = usize;

/// Statistics of one position
#[derive(Clone, Debug)]
pub struct Node {
    pub position: Position,
    /// Sum of all playout rewards credited to this node
    pub reward: f64,
    pub visits: u64,
    /// Visits that reached this node from each predecessor
    pub edge_visits: HashMap<NodeId, u64>,
}

impl Node {
    fn new(position: Position) -> Self {
        Self {
            position,
            reward: 0.0,
            visits: 0,
            edge_visits: HashMap::new(),
        }
    }

    /// Empirical value, 0 for an unvisited node
    pub fn mean(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.reward / self.visits as f64
        }
    }

    pub fn edge_visits_from(&self, parent: NodeId) -> u64 {
        self.edge_visits.get(&parent).copied().unwrap_or(0)
    }
}

/// Arena of nodes keyed by position
#[derive(Clone, Debug, Default)]
pub struct NodeTable {
    nodes: Vec<Node>,
    index: HashMap<u64, NodeId>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_of(&self, position: &Position) -> Option<NodeId> {
        self.index.get(&position.key()).copied()
    }

    /// The id of `position`, inserting it with zero statistics if missing
    pub fn get_or_insert(&mut self, position: Position) -> NodeId {
        let nodes = &mut self.nodes;
        *self.index.entry(position.key()).or_insert_with(|| {
            nodes.push(Node::new(position));
            nodes.len() - 1
        })
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get(&self, position: &Position) -> Option<&Node> {
        self.id_of(position).map(|id| &self.nodes[id])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }
}

/// Reward of a finished playout from the point of view of `Side::One`
pub fn reward_of(result: Option<GameResult>) -> f64 {
    match result {
        Some(GameResult::Win(Side::One)) => 1.0,
        Some(GameResult::Win(Side::Two)) => 0.0,
        Some(GameResult::Draw) | None => 0.5,
    }
}

/// Outcome of one decision
#[derive(Clone, Debug, PartialEq)]
pub struct SearchStats {
    pub best_move: usize,
    /// Mean reward of the chosen child, from the point of view of `Side::One`
    pub value: f64,
    pub iterations: u64,
    pub root_visits: u64,
    pub table_size: usize,
    pub elapsed: Duration,
}

/// A tree search for a single decision, owning its node table
pub struct Mcts<R: Rng> {
    root: NodeId,
    table: NodeTable,
    config: MctsConfig,
    rng: R,
    iterations: u64,
}

impl<R: Rng> Mcts<R> {
    pub fn new(root: Position, config: MctsConfig, rng: R) -> Self {
        let mut table = NodeTable::new();
        let root = table.get_or_insert(root);
        Self {
            root,
            table,
            config,
            rng,
            iterations: 0,
        }
    }

    pub fn table(&self) -> &NodeTable {
        &self.table
    }

    pub fn root(&self) -> &Node {
        self.table.node(self.root)
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Runs iterations until `time_budget` elapses or the iteration cap is hit
    pub fn search(&mut self, time_budget: Duration) -> Result<SearchStats> {
        let start = Instant::now();
        if self.root().position.legal_moves().is_empty() {
            return Err(EngineError::NoLegalMoves);
        }

        loop {
            if start.elapsed() >= time_budget {
                break;
            }
            if let Some(max_iterations) = self.config.max_iterations {
                if self.iterations >= max_iterations {
                    break;
                }
            }
            self.iterate();
        }

        let (best_move, value) = self.best_move().ok_or(EngineError::NoLegalMoves)?;
        let stats = SearchStats {
            best_move,
            value,
            iterations: self.iterations,
            root_visits: self.root().visits,
            table_size: self.table.len(),
            elapsed: start.elapsed(),
        };
        debug!(
            column = stats.best_move,
            value = stats.value,
            iterations = stats.iterations,
            nodes = stats.table_size,
            "mcts decision"
        );
        Ok(stats)
    }

    /// One round of selection, expansion, simulation and backpropagation
    pub fn iterate(&mut self) {
        let mut path = self.select();
        let leaf = match path.last() {
            Some(&leaf) => leaf,
            None => return,
        };

        let leaf_position = self.table.node(leaf).position;
        let subject = if self.table.node(leaf).visits > 0 && !leaf_position.is_terminal() {
            let legal_moves = leaf_position.legal_moves();
            for &column in legal_moves.iter() {
                self.table.get_or_insert(leaf_position.play_unchecked(column));
            }
            match legal_moves.choose(&mut self.rng) {
                Some(&column) => {
                    let child = self.table.get_or_insert(leaf_position.play_unchecked(column));
                    path.push(child);
                    child
                }
                None => leaf,
            }
        } else {
            leaf
        };

        let position = self.table.node(subject).position;
        let runs = self.config.rollouts_per_leaf;
        let mut reward = 0.0;
        for _ in 0..runs {
            reward += self.rollout(position);
        }

        self.backpropagate(&path, reward, runs as u64);
        self.iterations += 1;
    }

    /// Walks down from the root to the node to simulate
    ///
    /// Stops at an unvisited or terminal node, at a child missing from the
    /// table (which is inserted) or at a child never reached from the current
    /// node.
    fn select(&mut self) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = self.root;

        loop {
            path.push(current);
            let node = self.table.node(current);
            if node.visits == 0 || node.position.is_terminal() {
                return path;
            }

            let position = node.position;
            let parent_visits = node.visits as f64;
            let maximizing = position.side_to_move() == Side::One;
            let mut best: Option<(NodeId, f64)> = None;

            for column in position.legal_moves() {
                let child = position.play_unchecked(column);
                let child_id = match self.table.id_of(&child) {
                    Some(id) => id,
                    None => {
                        path.push(self.table.get_or_insert(child));
                        return path;
                    }
                };

                let child_node = self.table.node(child_id);
                let edge_visits = child_node.edge_visits_from(current);
                if edge_visits == 0 {
                    path.push(child_id);
                    return path;
                }

                let bound = (self.config.exploration * parent_visits.ln() / edge_visits as f64).sqrt();
                let score = if maximizing {
                    child_node.mean() + bound
                } else {
                    child_node.mean() - bound
                };
                let better = match best {
                    None => true,
                    Some((_, best_score)) if maximizing => score > best_score,
                    Some((_, best_score)) => score < best_score,
                };
                if better {
                    best = Some((child_id, score));
                }
            }

            match best {
                Some((child_id, _)) => current = child_id,
                None => return path,
            }
        }
    }

    /// Plays uniformly random moves until the game ends
    fn rollout(&mut self, mut position: Position) -> f64 {
        while !position.is_terminal() {
            match position.legal_moves().choose(&mut self.rng) {
                Some(&column) => position = position.play_unchecked(column),
                None => break,
            }
        }
        reward_of(position.result())
    }

    fn backpropagate(&mut self, path: &[NodeId], reward: f64, runs: u64) {
        let mut parent: Option<NodeId> = None;
        for &id in path {
            let node = &mut self.table.nodes[id];
            node.reward += reward;
            node.visits += runs;
            if let Some(parent) = parent {
                *node.edge_visits.entry(parent).or_insert(0) += runs;
            }
            parent = Some(id);
        }
    }

    /// The root move with the best mean for the side to move
    ///
    /// Children missing from the table score 0; ties keep the lowest column.
    /// Rewards lie in `0..=1` for `Side::One`, so an unexplored child scores
    /// as a certain loss when `Side::One` is to move and as a certain win
    /// when `Side::Two` is. Selection inserts one missing root child per
    /// iteration, so every root child is in the table after `WIDTH + 1`
    /// iterations and this only shows under a tiny iteration cap.
    pub fn best_move(&self) -> Option<(usize, f64)> {
        let root = self.root().position;
        let maximizing = root.side_to_move() == Side::One;
        let mut best: Option<(usize, f64)> = None;

        for column in root.legal_moves() {
            let child = root.play_unchecked(column);
            let score = self.table.get(&child).map(Node::mean).unwrap_or(0.0);
            let better = match best {
                None => true,
                Some((_, best_score)) if maximizing => score > best_score,
                Some((_, best_score)) => score < best_score,
            };
            if better {
                best = Some((column, score));
            }
        }
        best
    }
}
