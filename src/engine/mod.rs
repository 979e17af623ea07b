// src/engine/mod.rs

//! Plan execution engine.
//!
//! This module ties together:
//! - the pure run core ([`core`]): task state, timeline, stop reasons
//! - the async shell ([`run`]): dispatching tasks to workers and collecting
//!   their completions over a channel
//! - the performance tracker ([`tracker`]) consumed by the adaptive strategy
//! - the public entry point ([`executor::PlanExecutor`])

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::errors::TaskError;

/// Outcome a worker reports back once the task executor returns.
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    /// Insertion index of the task in its plan.
    pub task: usize,
    pub outcome: Result<serde_json::Value, TaskError>,
    pub finished_at: DateTime<Utc>,
    /// Time spent inside the task executor.
    pub elapsed: Duration,
}

pub mod core;
pub mod executor;
pub mod options;
pub mod result;
pub mod run;
pub mod timeline;
pub mod tracker;

pub use self::core::{FinishStep, Prepared, RunCore};
pub use executor::PlanExecutor;
pub use options::ExecutorConfig;
pub use result::{PlanMetrics, PlanResult, StopReason, TaskReport};
pub use run::PlanRun;
pub use timeline::{Timeline, TimelineEvent, TimelineEventKind};
pub use tracker::{PerformanceSample, PerformanceTracker, TrackerHandle};
