// src/strategy/mod.rs

//! Execution strategies.
//!
//! A strategy only decides *when* each task is handed to the task executor;
//! dispatching, state transitions and bookkeeping live in
//! [`crate::engine::PlanRun`].
//!
//! - [`sequential`]: one task at a time in topological order.
//! - [`parallel`]: level by level with bounded concurrency.
//! - [`adaptive`]: picks one of the two for each level based on measured
//!   efficiency.

pub mod adaptive;
pub mod parallel;
pub mod sequential;

pub use adaptive::Adaptive;
pub use parallel::Parallel;
pub use sequential::Sequential;

use crate::engine::{ExecutorConfig, PlanRun};
use crate::errors::Result;
use crate::types::StrategyKind;

/// What a level runner did with one level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelStats {
    /// Tasks dispatched (excludes skipped ones).
    pub ran: usize,
}

#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    Sequential(Sequential),
    Parallel(Parallel),
    Adaptive(Adaptive),
}

impl Strategy {
    pub fn from_config(config: &ExecutorConfig) -> Self {
        match config.strategy {
            StrategyKind::Sequential => Strategy::Sequential(Sequential),
            StrategyKind::Parallel => Strategy::Parallel(Parallel::new(config.max_parallel)),
            StrategyKind::Adaptive => Strategy::Adaptive(Adaptive::new(
                config.adaptive_threshold,
                config.max_parallel,
            )),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Sequential(_) => StrategyKind::Sequential,
            Strategy::Parallel(_) => StrategyKind::Parallel,
            Strategy::Adaptive(_) => StrategyKind::Adaptive,
        }
    }

    /// Mode currently in effect; for adaptive runs, the delegate it last
    /// selected.
    pub fn current_mode(&self) -> StrategyKind {
        match self {
            Strategy::Adaptive(a) => a.mode(),
            other => other.kind(),
        }
    }

    pub async fn execute(&mut self, run: &mut PlanRun) -> Result<()> {
        match self {
            Strategy::Sequential(s) => s.execute(run).await,
            Strategy::Parallel(p) => p.execute(run).await,
            Strategy::Adaptive(a) => a.execute(run).await,
        }
    }
}
