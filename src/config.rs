//! Engine configuration, loaded from TOML with built-in defaults
//!
//! Lookup order: an explicit path, then the `CONNECT4_CONFIG` environment
//! variable, then `connect4.toml` in the working directory. Every field is
//! optional in the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::transposition_table::DEFAULT_CAPACITY;

pub const CONFIG_ENV_VAR: &str = "CONNECT4_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "connect4.toml";

/// Which search algorithm picks the move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Mcts,
    Negamax,
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mcts" => Ok(EngineKind::Mcts),
            "negamax" => Ok(EngineKind::Negamax),
            other => Err(format!("unknown engine '{}', expected mcts or negamax", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegamaxConfig {
    /// Deepest iteration of iterative deepening
    pub max_depth: u32,
    /// Fraction of the budget after which no new depth is started
    pub soft_stop: f64,
    pub use_transposition_table: bool,
    pub table_capacity: usize,
}

impl Default for NegamaxConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            soft_stop: 0.8,
            use_transposition_table: true,
            table_capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    /// Exploration constant `C` of the confidence bound
    pub exploration: f64,
    /// Random playouts per simulated leaf
    pub rollouts_per_leaf: u32,
    /// Optional cap on iterations, on top of the time budget
    pub max_iterations: Option<u64>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            exploration: 2.0,
            rollouts_per_leaf: 10,
            max_iterations: None,
        }
    }
}

/// Budget applying while the AI has made at most `until_move` moves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStep {
    pub until_move: u32,
    pub time_ms: u64,
    #[serde(default)]
    pub max_depth: Option<u32>,
}

impl BudgetStep {
    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_ms)
    }
}

fn default_schedule() -> Vec<BudgetStep> {
    [(2, 3_000), (8, 5_000), (13, 2_000), (u32::MAX, 1_000)]
        .iter()
        .map(|&(until_move, time_ms)| BudgetStep {
            until_move,
            time_ms,
            max_depth: None,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineKind,
    /// Seed for MCTS rollouts, `None` seeds from entropy
    pub seed: Option<u64>,
    pub negamax: NegamaxConfig,
    pub mcts: MctsConfig,
    pub schedule: Vec<BudgetStep>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Negamax,
            seed: None,
            negamax: NegamaxConfig::default(),
            mcts: MctsConfig::default(),
            schedule: default_schedule(),
        }
    }
}

impl EngineConfig {
    /// A config with one flat time budget for every move
    pub fn with_fixed_budget(engine: EngineKind, time_budget: Duration) -> Self {
        Self {
            engine,
            schedule: vec![BudgetStep {
                until_move: u32::MAX,
                time_ms: time_budget.as_millis() as u64,
                max_depth: None,
            }],
            ..Self::default()
        }
    }

    /// The schedule step for the given number of moves already made by the AI
    pub fn budget_for(&self, ai_moves_made: u32) -> BudgetStep {
        self.schedule
            .iter()
            .find(|step| ai_moves_made <= step.until_move)
            .or_else(|| self.schedule.last())
            .cloned()
            .unwrap_or(BudgetStep {
                until_move: u32::MAX,
                time_ms: 1_000,
                max_depth: None,
            })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).context("failed to parse engine config")?;
        // a schedule must stay sorted for `budget_for`
        config.schedule.sort_by_key(|step| step.until_move);
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Loads the config from `path`, or from the standard locations
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            info!("Loading config from {}", path.display());
            return Self::from_path(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                info!("Loading config from {}: {}", CONFIG_ENV_VAR, path.display());
                return Self::from_path(&path);
            }
            warn!("{}={} not found, searching defaults", CONFIG_ENV_VAR, path.display());
        }

        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return Self::from_path(path);
        }

        debug!("No {} found, using built-in defaults", DEFAULT_CONFIG_PATH);
        Ok(Self::default())
    }
}
