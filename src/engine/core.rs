// src/engine/core.rs

//! Pure core of a plan run.
//!
//! [`RunCore`] is the single writer for everything a run produces: task
//! status transitions, the timeline, the completed-task count and the stop
//! reason. It consumes [`TaskCompletion`]s and dispatch decisions from the
//! async shell ([`crate::engine::PlanRun`]) but has no channels, no Tokio
//! types and performs no IO, so it can be unit tested directly.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::dag::levels::level_indices;
use crate::dag::state_manager::{Readiness, readiness_of};
use crate::dag::topo::sorted_indices;
use crate::dag::{DagGraph, Plan, SkipReason, StateManager, TaskStatus};
use crate::engine::TaskCompletion;
use crate::engine::result::{PlanMetrics, PlanResult, StopReason, TaskReport};
use crate::engine::timeline::{Timeline, TimelineEventKind};
use crate::errors::{GoalCheckError, Result};
use crate::types::{FailurePolicy, StrategyKind};

/// Decision for a task a strategy is about to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prepared {
    /// All dependencies succeeded; the task may be dispatched.
    Ready,
    /// A dependency failed or was skipped; the task is now `Skipped`.
    Skipped,
    /// The task is no longer pending (e.g. skipped earlier through another
    /// failed dependency).
    AlreadyResolved,
    /// A dependency has not resolved yet. Strategies only offer tasks in
    /// dependency order, so this indicates a scheduling bug.
    Waiting,
    /// The run is stopping; nothing new may be dispatched.
    Stopped,
}

/// Result of applying one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishStep {
    pub failed: bool,
    /// Tasks completed (succeeded or failed) so far in this run.
    pub completed: usize,
}

#[derive(Debug)]
pub struct RunCore {
    plan: Plan,
    graph: DagGraph,
    order: Vec<usize>,
    levels: Vec<Vec<usize>>,
    timeline: Timeline,
    failure_policy: FailurePolicy,
    completed: usize,
    stop_reason: Option<StopReason>,
    goal_satisfied: Option<bool>,
}

impl RunCore {
    /// Validate the plan and derive its order and levels.
    ///
    /// Fails with `UnknownDependency` or `CycleDetected` before anything
    /// runs.
    pub fn new(plan: Plan, failure_policy: FailurePolicy) -> Result<Self> {
        let graph = DagGraph::build(&plan)?;
        let order = sorted_indices(&plan, &graph)?;
        let levels = level_indices(&graph, &order);

        debug!(
            plan = %plan.id(),
            tasks = plan.len(),
            levels = levels.len(),
            "plan validated"
        );

        Ok(Self {
            plan,
            graph,
            order,
            levels,
            timeline: Timeline::new(),
            failure_policy,
            completed: 0,
            stop_reason: None,
            goal_satisfied: None,
        })
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Task indices in topological order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Task indices grouped by dependency level.
    pub fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn task_id(&self, idx: usize) -> &str {
        self.plan.task_at(idx).id()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn goal_satisfied(&self) -> Option<bool> {
        self.goal_satisfied
    }

    /// Stop dispatching. The first reason recorded wins.
    pub fn stop(&mut self, reason: StopReason) {
        if self.stop_reason.is_none() {
            info!(plan = %self.plan.id(), ?reason, "run stopping; no further tasks will be dispatched");
            self.stop_reason = Some(reason);
        }
    }

    /// Decide whether `idx` can be dispatched now, skipping it if one of its
    /// dependencies did not succeed.
    pub fn prepare(&mut self, idx: usize) -> Prepared {
        if self.stop_reason.is_some() {
            return Prepared::Stopped;
        }
        if self.plan.task_at(idx).status() != TaskStatus::Pending {
            return Prepared::AlreadyResolved;
        }

        match readiness_of(&self.graph, &self.plan, idx) {
            Readiness::Ready => Prepared::Ready,
            Readiness::Waiting => {
                warn!(task = %self.task_id(idx), "task offered before its dependencies resolved");
                Prepared::Waiting
            }
            Readiness::Blocked(dep) => {
                let mut manager = StateManager::new(&self.graph, &mut self.plan);
                match manager.mark_blocked(idx, dep) {
                    Ok(()) => {
                        self.record_skip(idx);
                        Prepared::Skipped
                    }
                    Err(err) => {
                        warn!(error = %err, "could not skip blocked task");
                        Prepared::AlreadyResolved
                    }
                }
            }
        }
    }

    /// Mark a task as dispatched.
    pub fn start(&mut self, idx: usize, at: DateTime<Utc>) -> Result<()> {
        let mut manager = StateManager::new(&self.graph, &mut self.plan);
        manager.mark_running(idx, at)?;

        let task = self.plan.task_at(idx);
        self.timeline.push_at(
            at,
            TimelineEventKind::TaskStarted,
            task.id(),
            task.description(),
        );
        Ok(())
    }

    /// Apply the outcome reported by a worker.
    pub fn finish(&mut self, completion: TaskCompletion) -> Result<FinishStep> {
        let TaskCompletion {
            task: idx,
            outcome,
            finished_at,
            elapsed,
        } = completion;

        let failed = match outcome {
            Ok(value) => {
                self.plan
                    .task_at_mut(idx)
                    .mark_succeeded(finished_at, elapsed, value)?;
                debug!(task = %self.task_id(idx), elapsed_ms = elapsed.as_millis() as u64, "task succeeded");
                self.timeline.push_at(
                    finished_at,
                    TimelineEventKind::TaskCompleted,
                    self.plan.task_at(idx).id(),
                    format!("completed in {}ms", elapsed.as_millis()),
                );
                false
            }
            Err(err) => {
                let message = err.to_string();
                self.plan
                    .task_at_mut(idx)
                    .mark_failed(finished_at, elapsed, err)?;
                warn!(task = %self.task_id(idx), error = %message, "task failed");
                self.timeline.push_at(
                    finished_at,
                    TimelineEventKind::TaskFailed,
                    self.plan.task_at(idx).id(),
                    message,
                );
                true
            }
        };

        self.completed += 1;

        if failed && self.failure_policy == FailurePolicy::Abort {
            self.stop(StopReason::Aborted);
        }

        Ok(FinishStep {
            failed,
            completed: self.completed,
        })
    }

    /// Eagerly skip every pending transitive dependent of `idx`.
    pub fn skip_dependents_of(&mut self, idx: usize) -> Vec<usize> {
        let mut manager = StateManager::new(&self.graph, &mut self.plan);
        let skipped = manager.mark_dependents_skipped(idx);
        for &s in &skipped {
            self.record_skip(s);
        }
        skipped
    }

    /// Record a goal-check verdict. Returns `true` if the goal is satisfied.
    pub fn record_goal_check(&mut self, verdict: std::result::Result<bool, GoalCheckError>) -> bool {
        let subject = self
            .plan
            .goal()
            .unwrap_or(self.plan.id())
            .to_string();

        match verdict {
            Ok(satisfied) => {
                info!(plan = %self.plan.id(), completed = self.completed, satisfied, "goal checked");
                self.goal_satisfied = Some(satisfied);
                let content = if satisfied {
                    format!("satisfied after {} completed tasks", self.completed)
                } else {
                    format!("not satisfied after {} completed tasks", self.completed)
                };
                self.timeline
                    .push(TimelineEventKind::GoalChecked, subject, content);
                satisfied
            }
            Err(err) => {
                warn!(plan = %self.plan.id(), error = %err, "goal check failed");
                self.timeline.push(
                    TimelineEventKind::GoalChecked,
                    subject,
                    format!("check failed: {err}"),
                );
                false
            }
        }
    }

    pub fn record_strategy_switch(&mut self, to: StrategyKind, efficiency: f64, level: usize) {
        info!(strategy = %to, efficiency, level, "switching execution strategy");
        self.timeline.push(
            TimelineEventKind::StrategySwitched,
            to.as_str(),
            format!("efficiency {efficiency:.3} before level {level}"),
        );
    }

    /// Seal the run: skip whatever never got dispatched and build the result.
    pub fn into_result(mut self, execution_time: Duration, final_strategy: StrategyKind) -> PlanResult {
        let manager = StateManager::new(&self.graph, &mut self.plan);
        if !manager.all_tasks_terminal() {
            let reason = match self.stop_reason {
                Some(reason) => reason.skip_reason(),
                None => {
                    warn!(plan = %self.plan.id(), "run ended with pending tasks and no stop reason");
                    SkipReason::Canceled
                }
            };
            let mut manager = StateManager::new(&self.graph, &mut self.plan);
            let skipped = manager.skip_all_pending(reason);
            for idx in skipped {
                self.record_skip(idx);
            }
        }

        let metrics = PlanMetrics::from_plan(&self.plan, execution_time);
        info!(
            plan = %self.plan.id(),
            tasks = metrics.task_count,
            succeeded = metrics.success_count,
            failed = metrics.failure_count,
            skipped = metrics.skipped_count,
            "plan run finished"
        );

        PlanResult {
            plan_id: self.plan.id().to_string(),
            goal: self.plan.goal().map(str::to_string),
            tasks: self.plan.tasks().iter().map(TaskReport::from).collect(),
            timeline: self.timeline.into_events(),
            metrics,
            final_strategy,
            goal_satisfied: self.goal_satisfied,
            stop_reason: self.stop_reason,
        }
    }

    fn record_skip(&mut self, idx: usize) {
        let task = self.plan.task_at(idx);
        let content = match task.skip_reason() {
            Some(SkipReason::DependencyUnsatisfied { dependency }) => {
                format!("dependency '{dependency}' did not succeed")
            }
            Some(SkipReason::Aborted) => "plan aborted after a failure".to_string(),
            Some(SkipReason::Canceled) => "run canceled".to_string(),
            Some(SkipReason::DeadlineExceeded) => "plan deadline exceeded".to_string(),
            Some(SkipReason::GoalSatisfied) => "goal already satisfied".to_string(),
            None => "skipped".to_string(),
        };
        self.timeline
            .push(TimelineEventKind::TaskSkipped, task.id(), content);
    }
}
