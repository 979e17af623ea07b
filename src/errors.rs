// src/errors.rs

//! Crate-wide error types.
//!
//! - [`PlanError`] is the only error the plan executor itself returns; it is
//!   raised before any task runs (invalid graph, invalid configuration) or
//!   while loading a plan file.
//! - [`TaskError`] is what a [`crate::exec::TaskExecutor`] reports for a
//!   single task. It is captured into that task's state and never unwinds
//!   the executor.
//! - [`GoalCheckError`] is what a [`crate::exec::GoalChecker`] reports. It
//!   is logged into the timeline as a failed check.

use thiserror::Error;

use crate::dag::{TaskId, TaskStatus};

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid executor configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("task id must not be empty")]
    EmptyTaskId,

    #[error("duplicate task id '{0}'")]
    DuplicateTask(TaskId),

    #[error("task '{task}' has unknown dependency '{dependency}'")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    #[error("task '{0}' cannot depend on itself")]
    SelfDependency(TaskId),

    #[error("cycle detected in task graph involving task '{task}' (cycle: {})", cycle.join(" -> "))]
    CycleDetected { task: TaskId, cycle: Vec<TaskId> },

    #[error("task '{task}' cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        task: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure reported by the task execution capability for one task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task execution failed: {0}")]
    Execution(String),

    #[error("task exited with code {code}: {message}")]
    ExitStatus { code: i32, message: String },

    #[error("task canceled before completion")]
    Canceled,
}

impl TaskError {
    pub fn execution(message: impl Into<String>) -> Self {
        TaskError::Execution(message.into())
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        TaskError::Execution(format!("{err:#}"))
    }
}

/// Failure of the goal-check capability itself (not a "goal not met" verdict).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("goal check failed: {0}")]
pub struct GoalCheckError(pub String);

impl From<anyhow::Error> for GoalCheckError {
    fn from(err: anyhow::Error) -> Self {
        GoalCheckError(format!("{err:#}"))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PlanError>;
