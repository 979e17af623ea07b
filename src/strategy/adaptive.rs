// src/strategy/adaptive.rs

use tokio::time::Instant;
use tracing::debug;

use crate::engine::PlanRun;
use crate::errors::Result;
use crate::strategy::{Parallel, Sequential};
use crate::types::StrategyKind;

/// Switches between sequential and parallel execution per dependency level.
///
/// Starts sequential. Before every level after the first, it asks the
/// performance tracker for the current efficiency: above the threshold the
/// level runs in parallel, below it sequentially, and exactly at the
/// threshold the current mode is kept. Decisions are only ever made at level
/// boundaries.
#[derive(Debug, Clone, Copy)]
pub struct Adaptive {
    threshold: f64,
    mode: StrategyKind,
    sequential: Sequential,
    parallel: Parallel,
}

impl Adaptive {
    pub fn new(threshold: f64, max_parallel: usize) -> Self {
        Self {
            threshold,
            mode: StrategyKind::Sequential,
            sequential: Sequential,
            parallel: Parallel::new(max_parallel),
        }
    }

    /// Mode the next level would run in.
    pub fn mode(&self) -> StrategyKind {
        self.mode
    }

    pub async fn execute(&mut self, run: &mut PlanRun) -> Result<()> {
        let levels = run.core().levels().to_vec();

        for (n, level) in levels.iter().enumerate() {
            if run.should_stop() {
                break;
            }
            if n > 0 {
                self.reevaluate(run, n);
            }

            debug!(level = n, width = level.len(), mode = %self.mode, "running dependency level");

            let started = Instant::now();
            let stats = match self.mode {
                StrategyKind::Parallel => self.parallel.run_level(run, level).await?,
                _ => self.sequential.run_level(run, level).await?,
            };

            if stats.ran > 0 {
                run.tracker_mut()
                    .observe(self.mode, stats.ran, started.elapsed());
            }
        }

        Ok(())
    }

    fn reevaluate(&mut self, run: &mut PlanRun, level: usize) {
        let efficiency = run.tracker_mut().efficiency();
        let next = if efficiency > self.threshold {
            StrategyKind::Parallel
        } else if efficiency < self.threshold {
            StrategyKind::Sequential
        } else {
            self.mode
        };

        if next != self.mode {
            run.record_strategy_switch(next, efficiency, level);
            self.mode = next;
        }
    }
}
