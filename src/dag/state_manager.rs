// src/dag/state_manager.rs

//! Per-run state transitions for tasks in a plan.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::dag::task::{SkipReason, TaskStatus};
use crate::dag::{DagGraph, Plan};
use crate::errors::Result;

/// Readiness of a pending task with respect to its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Every dependency succeeded.
    Ready,
    /// Some dependency is still pending or running.
    Waiting,
    /// This dependency failed or was skipped; the task can never run.
    Blocked(usize),
}

/// Applies status transitions to the tasks of a plan.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    plan: &'a mut Plan,
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a DagGraph, plan: &'a mut Plan) -> Self {
        Self { graph, plan }
    }

    /// Determine whether the dependencies of `idx` allow it to run now.
    pub fn readiness(&self, idx: usize) -> Readiness {
        readiness_of(self.graph, self.plan, idx)
    }

    pub fn mark_running(&mut self, idx: usize, at: DateTime<Utc>) -> Result<()> {
        debug!(task = %self.plan.task_at(idx).id(), "dependencies satisfied; marking Running");
        self.plan.task_at_mut(idx).mark_running(at)
    }

    /// Skip a single pending task because `blocker` did not succeed.
    pub fn mark_blocked(&mut self, idx: usize, blocker: usize) -> Result<()> {
        let dependency = self.plan.task_at(blocker).id().to_string();
        debug!(
            task = %self.plan.task_at(idx).id(),
            dependency = %dependency,
            "dependency unsatisfied; marking Skipped"
        );
        self.plan
            .task_at_mut(idx)
            .mark_skipped(SkipReason::DependencyUnsatisfied { dependency })
    }

    /// Mark every pending transitive dependent of a failed (or skipped) task
    /// as `Skipped`.
    ///
    /// Each skipped task names the upstream task it was reached through.
    /// Returns the newly skipped tasks in the order they were marked.
    pub fn mark_dependents_skipped(&mut self, failed: usize) -> Vec<usize> {
        let mut stack: Vec<(usize, usize)> = self
            .graph
            .dependents_of(failed)
            .iter()
            .rev()
            .map(|&d| (d, failed))
            .collect();

        let mut newly_skipped = Vec::new();

        while let Some((idx, via)) = stack.pop() {
            if self.plan.task_at(idx).status() != TaskStatus::Pending {
                // Already terminal (or skipped through another path).
                continue;
            }

            match self.mark_blocked(idx, via) {
                Ok(()) => {
                    newly_skipped.push(idx);
                    stack.extend(self.graph.dependents_of(idx).iter().rev().map(|&d| (d, idx)));
                }
                Err(err) => {
                    warn!(error = %err, "could not skip dependent task");
                }
            }
        }

        newly_skipped
    }

    /// Skip every task that is still pending, e.g. after cancellation.
    pub fn skip_all_pending(&mut self, reason: SkipReason) -> Vec<usize> {
        let pending: Vec<usize> = (0..self.plan.len())
            .filter(|&idx| self.plan.task_at(idx).status() == TaskStatus::Pending)
            .collect();

        for &idx in &pending {
            if let Err(err) = self.plan.task_at_mut(idx).mark_skipped(reason.clone()) {
                warn!(error = %err, "could not skip pending task");
            }
        }

        pending
    }

    /// Check if all tasks are in a terminal state.
    pub fn all_tasks_terminal(&self) -> bool {
        self.plan.tasks().iter().all(|t| t.status().is_terminal())
    }
}

/// Read-only dependency check, usable with only shared access to the plan.
pub fn readiness_of(graph: &DagGraph, plan: &Plan, idx: usize) -> Readiness {
    let mut waiting = false;

    for &dep in graph.dependencies_of(idx) {
        match plan.task_at(dep).status() {
            TaskStatus::Succeeded => {}
            TaskStatus::Failed | TaskStatus::Skipped => return Readiness::Blocked(dep),
            TaskStatus::Pending | TaskStatus::Running => waiting = true,
        }
    }

    if waiting {
        Readiness::Waiting
    } else {
        Readiness::Ready
    }
}
