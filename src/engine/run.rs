// src/engine/run.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{OwnedSemaphorePermit, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::core::{FinishStep, Prepared, RunCore};
use crate::engine::options::ExecutorConfig;
use crate::engine::result::{PlanResult, StopReason};
use crate::engine::tracker::PerformanceTracker;
use crate::engine::TaskCompletion;
use crate::errors::{PlanError, Result, TaskError};
use crate::exec::{GoalChecker, TaskExecutor};
use crate::types::StrategyKind;

/// Async shell around [`RunCore`] for one plan execution.
///
/// Strategies decide *when* to dispatch; this type does the dispatching.
/// Each dispatched task runs in its own Tokio task and reports back over a
/// completion channel. Only the driving strategy reads that channel and
/// applies completions, so the core has a single writer and the timeline
/// reflects the order in which completions were received.
pub struct PlanRun {
    core: RunCore,
    executor: Arc<dyn TaskExecutor>,
    goal_checker: Option<Arc<dyn GoalChecker>>,
    ctx: CancellationToken,
    deadline: Option<Instant>,
    config: ExecutorConfig,
    tracker: PerformanceTracker,
    completion_tx: mpsc::UnboundedSender<TaskCompletion>,
    completion_rx: mpsc::UnboundedReceiver<TaskCompletion>,
    in_flight: usize,
}

impl fmt::Debug for PlanRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanRun")
            .field("core", &self.core)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl PlanRun {
    pub fn new(
        core: RunCore,
        executor: Arc<dyn TaskExecutor>,
        goal_checker: Option<Arc<dyn GoalChecker>>,
        ctx: CancellationToken,
        deadline: Option<Instant>,
        config: ExecutorConfig,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let tracker = PerformanceTracker::new(config.max_parallel, config.adaptive_window);
        Self {
            core,
            executor,
            goal_checker,
            ctx,
            deadline,
            config,
            tracker,
            completion_tx,
            completion_rx,
            in_flight: 0,
        }
    }

    pub fn core(&self) -> &RunCore {
        &self.core
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn tracker_mut(&mut self) -> &mut PerformanceTracker {
        &mut self.tracker
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Whether new dispatches must stop, picking up cancellation and the
    /// deadline from the run context.
    pub fn should_stop(&mut self) -> bool {
        if self.core.stop_reason().is_some() {
            return true;
        }
        if self.ctx.is_cancelled() {
            let reason = match self.deadline {
                Some(deadline) if Instant::now() >= deadline => StopReason::DeadlineExceeded,
                _ => StopReason::Canceled,
            };
            self.core.stop(reason);
            return true;
        }
        false
    }

    pub fn prepare(&mut self, idx: usize) -> Prepared {
        if self.should_stop() {
            return Prepared::Stopped;
        }
        self.core.prepare(idx)
    }

    /// Start `idx` on its own worker. The optional permit is held until the
    /// executor returns.
    pub fn dispatch(&mut self, idx: usize, permit: Option<OwnedSemaphorePermit>) -> Result<()> {
        self.core.start(idx, Utc::now())?;
        self.in_flight += 1;

        let task = self.core.plan().tasks()[idx].clone();
        let executor = Arc::clone(&self.executor);
        let ctx = self.ctx.clone();
        let tx = self.completion_tx.clone();

        debug!(task = %task.id(), in_flight = self.in_flight, "dispatching task");

        tokio::spawn(async move {
            let _permit = permit;
            let task_id = task.id().to_string();
            let started = Instant::now();

            // Run the capability on its own task so a panic inside it still
            // produces a completion.
            let worker = tokio::spawn(async move { executor.run_task(ctx, &task).await });
            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(TaskError::execution(format!(
                    "task executor panicked: {join_err}"
                ))),
            };

            let completion = TaskCompletion {
                task: idx,
                outcome,
                finished_at: Utc::now(),
                elapsed: started.elapsed(),
            };
            if tx.send(completion).is_err() {
                warn!(task = %task_id, "run finished before task completion was recorded");
            }
        });

        Ok(())
    }

    /// Wait for the next in-flight task to report back.
    pub async fn next_completion(&mut self) -> Result<TaskCompletion> {
        let completion = self.completion_rx.recv().await.ok_or_else(|| {
            PlanError::Other(anyhow::anyhow!("completion channel closed unexpectedly"))
        })?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Ok(completion)
    }

    /// Apply a completion and run a periodic goal check when one is due.
    ///
    /// Once the run is stopping, completions of in-flight tasks are still
    /// recorded but no longer trigger goal checks.
    pub async fn apply(&mut self, completion: TaskCompletion) -> Result<FinishStep> {
        let step = self.core.finish(completion)?;

        let interval = self.config.goal_check_interval;
        if interval > 0
            && step.completed % interval == 0
            && self.goal_checker.is_some()
            && self.core.stop_reason().is_none()
        {
            let satisfied = self.check_goal().await;
            if satisfied && self.config.stop_when_goal_met {
                self.core.stop(StopReason::GoalSatisfied);
            }
        }

        Ok(step)
    }

    /// Run dispatch-and-wait for a single task.
    pub async fn run_one(&mut self, idx: usize) -> Result<FinishStep> {
        self.dispatch(idx, None)?;
        let completion = self.next_completion().await?;
        self.apply(completion).await
    }

    pub fn skip_dependents_of(&mut self, idx: usize) -> Vec<usize> {
        self.core.skip_dependents_of(idx)
    }

    pub fn record_strategy_switch(&mut self, to: StrategyKind, efficiency: f64, level: usize) {
        self.core.record_strategy_switch(to, efficiency, level);
    }

    /// End-of-plan goal check. Skipped when the goal was already reported
    /// satisfied or the run was canceled.
    pub async fn final_goal_check(&mut self) {
        if self.goal_checker.is_none() || self.core.goal_satisfied() == Some(true) {
            return;
        }
        if matches!(
            self.core.stop_reason(),
            Some(StopReason::Canceled | StopReason::DeadlineExceeded)
        ) {
            debug!("run canceled; skipping final goal check");
            return;
        }
        self.check_goal().await;
    }

    async fn check_goal(&mut self) -> bool {
        let Some(checker) = self.goal_checker.clone() else {
            return false;
        };
        let verdict = checker.check_goal(self.ctx.clone(), self.core.plan()).await;
        self.core.record_goal_check(verdict)
    }

    pub fn into_result(self, execution_time: Duration, final_strategy: StrategyKind) -> PlanResult {
        if self.in_flight > 0 {
            warn!(in_flight = self.in_flight, "sealing run with tasks still in flight");
        }
        self.core.into_result(execution_time, final_strategy)
    }
}
