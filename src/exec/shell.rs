// src/exec/shell.rs

//! Shell-command capabilities.
//!
//! [`ShellTaskExecutor`] runs each task's configured command with
//! `tokio::process::Command` and turns its stdout into the task result.
//! [`ShellGoalChecker`] runs a single command whose exit status is the goal
//! verdict.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dag::{Plan, Task, TaskId};
use crate::errors::{GoalCheckError, TaskError};
use crate::exec::backend::{BoxFuture, GoalChecker, TaskExecutor};

/// Number of stderr lines kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Runs tasks as shell commands, keyed by task id.
///
/// Tasks without a command succeed immediately with a `null` result.
#[derive(Debug, Clone, Default)]
pub struct ShellTaskExecutor {
    commands: HashMap<TaskId, String>,
}

impl ShellTaskExecutor {
    pub fn new(commands: HashMap<TaskId, String>) -> Self {
        Self { commands }
    }

    pub fn command_for(&self, task: &str) -> Option<&str> {
        self.commands.get(task).map(|s| s.as_str())
    }
}

impl TaskExecutor for ShellTaskExecutor {
    fn run_task<'a>(
        &'a self,
        ctx: CancellationToken,
        task: &'a Task,
    ) -> BoxFuture<'a, Result<serde_json::Value, TaskError>> {
        Box::pin(async move {
            let Some(cmd) = self.command_for(task.id()) else {
                debug!(task = %task.id(), "no command configured; nothing to run");
                return Ok(serde_json::Value::Null);
            };

            info!(task = %task.id(), cmd = %cmd, "starting task process");
            let output = run_command(task.id(), cmd, &ctx).await?;

            match output.code {
                Some(0) => Ok(serde_json::Value::String(output.stdout)),
                code => Err(TaskError::ExitStatus {
                    code: code.unwrap_or(-1),
                    message: output.stderr_tail,
                }),
            }
        })
    }
}

/// Goal checker backed by a shell command: exit status 0 means satisfied.
#[derive(Debug, Clone)]
pub struct ShellGoalChecker {
    cmd: String,
}

impl ShellGoalChecker {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl GoalChecker for ShellGoalChecker {
    fn check_goal<'a>(
        &'a self,
        ctx: CancellationToken,
        plan: &'a Plan,
    ) -> BoxFuture<'a, Result<bool, GoalCheckError>> {
        Box::pin(async move {
            let label = format!("goal:{}", plan.id());
            match run_command(&label, &self.cmd, &ctx).await {
                Ok(output) => Ok(output.code == Some(0)),
                Err(TaskError::Canceled) => Err(GoalCheckError(
                    "goal check canceled before completion".to_string(),
                )),
                Err(err) => Err(GoalCheckError(err.to_string())),
            }
        })
    }
}

struct CommandOutput {
    code: Option<i32>,
    stdout: String,
    stderr_tail: String,
}

fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Run `cmd` to completion, or kill it when `ctx` is canceled.
async fn run_command(
    label: &str,
    cmd: &str,
    ctx: &CancellationToken,
) -> Result<CommandOutput, TaskError> {
    let mut child = shell_command(cmd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning process for '{label}'"))?;

    let stdout_reader = spawn_stdout_reader(&mut child);
    let stderr_reader = spawn_stderr_reader(label, &mut child);

    tokio::select! {
        status_res = child.wait() => {
            let status = status_res
                .with_context(|| format!("waiting for process of '{label}'"))?;

            let stdout = stdout_reader
                .await
                .context("joining stdout reader")?
                .context("reading stdout")?;
            let stderr_tail = stderr_reader
                .await
                .context("joining stderr reader")?;

            info!(
                task = %label,
                exit_code = status.code().unwrap_or(-1),
                success = status.success(),
                "task process exited"
            );

            Ok(CommandOutput {
                code: status.code(),
                stdout: stdout.trim_end().to_string(),
                stderr_tail,
            })
        }

        _ = ctx.cancelled() => {
            info!(task = %label, "run canceled; killing process");
            if let Err(e) = child.kill().await {
                warn!(task = %label, error = %e, "failed to kill child process on cancellation");
            }
            Err(TaskError::Canceled)
        }
    }
}

fn spawn_stdout_reader(child: &mut Child) -> tokio::task::JoinHandle<Result<String>> {
    let stdout = child.stdout.take();
    tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut stdout) = stdout {
            stdout.read_to_string(&mut buf).await?;
        }
        Ok(buf)
    })
}

/// Always consume stderr so buffers don't fill; log at debug and keep a tail.
fn spawn_stderr_reader(label: &str, child: &mut Child) -> tokio::task::JoinHandle<String> {
    let stderr = child.stderr.take();
    let label = label.to_string();
    tokio::spawn(async move {
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %label, "stderr: {}", line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }
        tail.into_iter().collect::<Vec<_>>().join("\n")
    })
}
