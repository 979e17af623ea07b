// src/exec/mod.rs

//! Task execution capabilities.
//!
//! - [`backend`] defines the [`TaskExecutor`] and [`GoalChecker`] traits the
//!   plan executor dispatches through.
//! - [`shell`] provides shell-command implementations of both, used by the
//!   `planflow` binary.

pub mod backend;
pub mod shell;

pub use backend::{BoxFuture, GoalChecker, TaskExecutor};
pub use shell::{ShellGoalChecker, ShellTaskExecutor};
