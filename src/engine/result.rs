// src/engine/result.rs

//! Output of a plan run: per-task reports, timeline and metrics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::dag::{Plan, SkipReason, Task, TaskId, TaskStatus};
use crate::engine::timeline::TimelineEvent;
use crate::types::StrategyKind;

/// Why a run stopped dispatching before every task had a chance to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Canceled,
    DeadlineExceeded,
    Aborted,
    GoalSatisfied,
}

impl StopReason {
    pub(crate) fn skip_reason(self) -> SkipReason {
        match self {
            StopReason::Canceled => SkipReason::Canceled,
            StopReason::DeadlineExceeded => SkipReason::DeadlineExceeded,
            StopReason::Aborted => SkipReason::Aborted,
            StopReason::GoalSatisfied => SkipReason::GoalSatisfied,
        }
    }
}

/// Aggregate figures for a finished run.
///
/// Skipped tasks count towards `task_count` (and so lower `success_rate`)
/// but are neither successes nor failures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanMetrics {
    pub task_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    /// `success_count / task_count`, or 1.0 for an empty plan.
    pub success_rate: f64,
    #[serde(serialize_with = "as_millis")]
    pub execution_time: Duration,
    /// Mean executor time over tasks that actually ran.
    #[serde(serialize_with = "as_millis")]
    pub avg_task_duration: Duration,
}

impl PlanMetrics {
    pub fn from_plan(plan: &Plan, execution_time: Duration) -> Self {
        let task_count = plan.len();
        let success_count = plan.count_with_status(TaskStatus::Succeeded);
        let failure_count = plan.count_with_status(TaskStatus::Failed);
        let skipped_count = plan.count_with_status(TaskStatus::Skipped);

        let success_rate = if task_count == 0 {
            1.0
        } else {
            success_count as f64 / task_count as f64
        };

        let ran: Vec<Duration> = plan.tasks().iter().filter_map(Task::duration).collect();
        let avg_task_duration = if ran.is_empty() {
            Duration::ZERO
        } else {
            let total: u128 = ran.iter().map(Duration::as_nanos).sum();
            let nanos = total / ran.len() as u128;
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        };

        Self {
            task_count,
            success_count,
            failure_count,
            skipped_count,
            success_rate,
            execution_time,
            avg_task_duration,
        }
    }
}

/// Final state of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub id: TaskId,
    pub description: String,
    pub dependencies: Vec<TaskId>,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "opt_as_millis")]
    pub duration: Option<Duration>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub skip_reason: Option<SkipReason>,
}

impl From<&Task> for TaskReport {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id().to_string(),
            description: task.description().to_string(),
            dependencies: task.dependencies().to_vec(),
            status: task.status(),
            started_at: task.started_at(),
            finished_at: task.finished_at(),
            duration: task.duration(),
            result: task.result().cloned(),
            error: task.error().map(|e| e.to_string()),
            skip_reason: task.skip_reason().cloned(),
        }
    }
}

/// Everything a caller gets back from a plan run.
#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub plan_id: String,
    pub goal: Option<String>,
    /// Reports in plan insertion order.
    pub tasks: Vec<TaskReport>,
    pub timeline: Vec<TimelineEvent>,
    pub metrics: PlanMetrics,
    /// Strategy in effect when the run ended (differs from the configured
    /// one only for adaptive runs).
    pub final_strategy: StrategyKind,
    /// Verdict of the last successful goal check, if any ran.
    pub goal_satisfied: Option<bool>,
    pub stop_reason: Option<StopReason>,
}

impl PlanResult {
    pub fn task(&self, id: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.task(id).map(|t| t.status)
    }

    pub fn has_failures(&self) -> bool {
        self.metrics.failure_count > 0
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn opt_as_millis<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&(d.as_millis() as u64)),
        None => s.serialize_none(),
    }
}
