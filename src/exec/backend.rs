// src/exec/backend.rs

//! Pluggable capabilities the plan executor calls out to.
//!
//! The scheduler never knows *how* a task is carried out. It hands each task
//! to a [`TaskExecutor`] and records whatever comes back. Production code can
//! use [`crate::exec::ShellTaskExecutor`]; tests provide fakes that record
//! dispatch order and simulate failures or latency.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::dag::{Plan, Task};
use crate::errors::{GoalCheckError, TaskError};

/// Boxed future returned by the capability traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs a single task and reports its outcome.
///
/// The token is the run context. It is canceled when the caller cancels the
/// plan or its timeout elapses; implementations decide for themselves whether
/// to abort work that is already in progress.
pub trait TaskExecutor: Send + Sync {
    fn run_task<'a>(
        &'a self,
        ctx: CancellationToken,
        task: &'a Task,
    ) -> BoxFuture<'a, Result<serde_json::Value, TaskError>>;
}

/// Judges whether a plan's goal is already satisfied.
///
/// `plan` reflects every task status recorded so far.
pub trait GoalChecker: Send + Sync {
    fn check_goal<'a>(
        &'a self,
        ctx: CancellationToken,
        plan: &'a Plan,
    ) -> BoxFuture<'a, Result<bool, GoalCheckError>>;
}
