// src/engine/executor.rs

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dag::Plan;
use crate::engine::core::RunCore;
use crate::engine::options::ExecutorConfig;
use crate::engine::result::PlanResult;
use crate::engine::run::PlanRun;
use crate::errors::Result;
use crate::exec::{GoalChecker, TaskExecutor};
use crate::strategy::Strategy;

/// Entry point for running a plan.
///
/// Validates the plan, drives the configured strategy to completion and
/// assembles the [`PlanResult`]. Task failures, skips, cancellation and goal
/// check errors all end up inside the result; only an invalid plan or
/// configuration is returned as `Err`.
#[derive(Clone)]
pub struct PlanExecutor {
    executor: Arc<dyn TaskExecutor>,
    goal_checker: Option<Arc<dyn GoalChecker>>,
}

impl std::fmt::Debug for PlanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanExecutor")
            .field("goal_checker", &self.goal_checker.is_some())
            .finish_non_exhaustive()
    }
}

impl PlanExecutor {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            executor,
            goal_checker: None,
        }
    }

    pub fn with_goal_checker(mut self, checker: Arc<dyn GoalChecker>) -> Self {
        self.goal_checker = Some(checker);
        self
    }

    /// Execute `plan` under `config`.
    ///
    /// Canceling `ctx` (or hitting `config.timeout`) stops dispatching new
    /// tasks; tasks already handed to the executor finish on their own terms
    /// and are recorded.
    pub async fn execute(
        &self,
        ctx: CancellationToken,
        plan: Plan,
        config: &ExecutorConfig,
    ) -> Result<PlanResult> {
        config.validate()?;
        let core = RunCore::new(plan, config.failure_policy)?;

        info!(
            plan = %core.plan().id(),
            tasks = core.plan().len(),
            levels = core.levels().len(),
            strategy = %config.strategy,
            max_parallel = config.max_parallel,
            "starting plan run"
        );

        let started = Instant::now();
        let run_token = ctx.child_token();
        // A timeout too large for the clock means no deadline at all.
        let deadline = config.timeout.and_then(|t| {
            let deadline = started.checked_add(t);
            if deadline.is_none() {
                warn!(
                    timeout_secs = t.as_secs(),
                    "timeout exceeds the clock range; running without a deadline"
                );
            }
            deadline
        });
        let timer = deadline.map(|deadline| spawn_deadline(run_token.clone(), deadline));

        let mut run = PlanRun::new(
            core,
            Arc::clone(&self.executor),
            self.goal_checker.clone(),
            run_token,
            deadline,
            config.clone(),
        );

        let mut strategy = Strategy::from_config(config);
        let outcome = strategy.execute(&mut run).await;

        if let Some(timer) = timer {
            timer.abort();
        }
        outcome?;

        run.final_goal_check().await;

        Ok(run.into_result(started.elapsed(), strategy.current_mode()))
    }
}

/// Cancel `token` once `deadline` passes.
fn spawn_deadline(token: CancellationToken, deadline: Instant) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                info!("plan deadline exceeded; canceling run");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}
