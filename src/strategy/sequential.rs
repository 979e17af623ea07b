// src/strategy/sequential.rs

use tracing::debug;

use crate::engine::{PlanRun, Prepared};
use crate::errors::Result;
use crate::strategy::LevelStats;

/// One task at a time, in topological order.
///
/// A failure eagerly skips every transitive dependent of the failed task;
/// independent tasks still run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl Sequential {
    pub async fn execute(&self, run: &mut PlanRun) -> Result<()> {
        let order = run.core().order().to_vec();
        let stats = self.run_tasks(run, &order).await?;
        debug!(ran = stats.ran, "sequential run finished");
        Ok(())
    }

    /// Run one dependency level, one task at a time.
    pub async fn run_level(&self, run: &mut PlanRun, level: &[usize]) -> Result<LevelStats> {
        self.run_tasks(run, level).await
    }

    async fn run_tasks(&self, run: &mut PlanRun, tasks: &[usize]) -> Result<LevelStats> {
        let mut stats = LevelStats::default();

        for &idx in tasks {
            match run.prepare(idx) {
                Prepared::Ready => {}
                Prepared::Stopped => break,
                Prepared::Skipped | Prepared::AlreadyResolved | Prepared::Waiting => continue,
            }

            let step = run.run_one(idx).await?;
            stats.ran += 1;

            if step.failed {
                run.skip_dependents_of(idx);
            }
        }

        Ok(stats)
    }
}
