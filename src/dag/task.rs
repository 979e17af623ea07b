// src/dag/task.rs

//! Task definition plus its per-run execution state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{PlanError, Result, TaskError};

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// Execution status of a task.
///
/// Transitions only move forward:
/// `Pending -> Running -> {Succeeded | Failed}` and `Pending -> Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Skipped
        )
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Skipped)
                | (TaskStatus::Running, TaskStatus::Succeeded)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

/// Why a task was skipped instead of run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A dependency failed or was itself skipped.
    DependencyUnsatisfied { dependency: TaskId },
    /// An earlier failure stopped the plan under the abort policy.
    Aborted,
    /// The run context was canceled before the task was dispatched.
    Canceled,
    /// The plan timeout elapsed before the task was dispatched.
    DeadlineExceeded,
    /// A goal check reported the plan's goal as already met.
    GoalSatisfied,
}

/// A unit of work in a [`crate::dag::Plan`].
///
/// The definition part (`id`, `description`, `dependencies`) is fixed by the
/// caller. Status, timestamps, result and error are only ever written by the
/// plan executor while the plan runs.
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    description: String,
    dependencies: Vec<TaskId>,

    status: TaskStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    duration: Option<Duration>,
    result: Option<serde_json::Value>,
    error: Option<TaskError>,
    skip_reason: Option<SkipReason>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
            started_at: None,
            finished_at: None,
            duration: None,
            result: None,
            error: None,
            skip_reason: None,
        }
    }

    /// Add a dependency. Repeated ids are collapsed.
    pub fn with_dependency(mut self, dep: impl Into<TaskId>) -> Self {
        let dep = dep.into();
        if !self.dependencies.contains(&dep) {
            self.dependencies.push(dep);
        }
        self
    }

    pub fn with_dependencies<I, S>(self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        deps.into_iter().fold(self, |task, dep| task.with_dependency(dep))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn dependencies(&self) -> &[TaskId] {
        &self.dependencies
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Time spent inside the task executor, for tasks that actually ran.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn result(&self) -> Option<&serde_json::Value> {
        self.result.as_ref()
    }

    /// Present iff the task is `Failed`.
    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    /// Present iff the task is `Skipped`.
    pub fn skip_reason(&self) -> Option<&SkipReason> {
        self.skip_reason.as_ref()
    }

    fn transition(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(PlanError::InvalidTransition {
                task: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub(crate) fn mark_running(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(TaskStatus::Running)?;
        self.started_at = Some(at);
        Ok(())
    }

    pub(crate) fn mark_succeeded(
        &mut self,
        at: DateTime<Utc>,
        duration: Duration,
        result: serde_json::Value,
    ) -> Result<()> {
        self.transition(TaskStatus::Succeeded)?;
        self.finished_at = Some(at);
        self.duration = Some(duration);
        self.result = Some(result);
        Ok(())
    }

    pub(crate) fn mark_failed(
        &mut self,
        at: DateTime<Utc>,
        duration: Duration,
        error: TaskError,
    ) -> Result<()> {
        self.transition(TaskStatus::Failed)?;
        self.finished_at = Some(at);
        self.duration = Some(duration);
        self.error = Some(error);
        Ok(())
    }

    pub(crate) fn mark_skipped(&mut self, reason: SkipReason) -> Result<()> {
        self.transition(TaskStatus::Skipped)?;
        self.skip_reason = Some(reason);
        Ok(())
    }
}
