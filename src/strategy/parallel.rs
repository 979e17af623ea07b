// src/strategy/parallel.rs

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::engine::{PlanRun, Prepared};
use crate::errors::{PlanError, Result};
use crate::strategy::LevelStats;

/// Dependency level by dependency level, up to `max_parallel` tasks at once.
///
/// Each level is a barrier: the next level starts only after every task in
/// the current one has resolved. A failure never cancels running siblings;
/// its dependents are skipped when their level comes up.
#[derive(Debug, Clone, Copy)]
pub struct Parallel {
    max_parallel: usize,
}

impl Parallel {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    pub async fn execute(&self, run: &mut PlanRun) -> Result<()> {
        let levels = run.core().levels().to_vec();

        for (n, level) in levels.iter().enumerate() {
            if run.should_stop() {
                break;
            }
            debug!(level = n, width = level.len(), "running dependency level");
            self.run_level(run, level).await?;
        }

        Ok(())
    }

    /// Run a single level to completion.
    pub async fn run_level(&self, run: &mut PlanRun, level: &[usize]) -> Result<LevelStats> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut queue: VecDeque<usize> = level.iter().copied().collect();
        let mut in_flight = 0usize;
        let mut stats = LevelStats::default();

        loop {
            if run.should_stop() {
                queue.clear();
            }
            if queue.is_empty() && in_flight == 0 {
                break;
            }

            tokio::select! {
                permit = semaphore.clone().acquire_owned(), if !queue.is_empty() => {
                    let permit = permit.map_err(|e| {
                        PlanError::Other(anyhow::anyhow!("worker pool closed: {e}"))
                    })?;
                    let Some(idx) = queue.pop_front() else {
                        continue;
                    };
                    if run.prepare(idx) == Prepared::Ready {
                        run.dispatch(idx, Some(permit))?;
                        in_flight += 1;
                        stats.ran += 1;
                    }
                }

                completion = run.next_completion(), if in_flight > 0 => {
                    let completion = completion?;
                    in_flight -= 1;
                    run.apply(completion).await?;
                }
            }
        }

        Ok(stats)
    }
}
