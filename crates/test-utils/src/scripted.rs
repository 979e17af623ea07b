use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use planflow::dag::{Plan, Task, TaskStatus};
use planflow::errors::{GoalCheckError, TaskError};
use planflow::exec::{BoxFuture, GoalChecker, TaskExecutor};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// What the scripted executor does for one task.
#[derive(Debug, Clone)]
enum Behaviour {
    Succeed(Value),
    Fail(String),
    Panic,
    /// Block until the run context is canceled, then report `Canceled`.
    WaitForCancel,
}

/// A fake task executor that:
/// - succeeds by default, returning the task id as its result
/// - can be told to fail, panic, sleep or block per task
/// - records dispatch order and the peak number of concurrently running
///   tasks.
///
/// Delays use `tokio::time::sleep`, so tests running with paused time are
/// deterministic.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    behaviours: HashMap<String, Behaviour>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    dispatched: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(mut self, task: &str, message: &str) -> Self {
        self.behaviours
            .insert(task.to_string(), Behaviour::Fail(message.to_string()));
        self
    }

    pub fn panic_on(mut self, task: &str) -> Self {
        self.behaviours.insert(task.to_string(), Behaviour::Panic);
        self
    }

    pub fn wait_for_cancel(mut self, task: &str) -> Self {
        self.behaviours
            .insert(task.to_string(), Behaviour::WaitForCancel);
        self
    }

    pub fn result(mut self, task: &str, value: Value) -> Self {
        self.behaviours
            .insert(task.to_string(), Behaviour::Succeed(value));
        self
    }

    pub fn delay(mut self, task: &str, delay: Duration) -> Self {
        self.delays.insert(task.to_string(), delay);
        self
    }

    /// Delay applied to every task without its own.
    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Task ids in the order the executor was invoked.
    pub fn dispatch_order(&self) -> Vec<String> {
        self.dispatched.lock().unwrap().clone()
    }

    /// Task ids in the order the executor returned.
    pub fn finish_order(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.dispatched.lock().unwrap().len()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Decrements the running count even if the task panics.
struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TaskExecutor for ScriptedExecutor {
    fn run_task<'a>(
        &'a self,
        ctx: CancellationToken,
        task: &'a Task,
    ) -> BoxFuture<'a, Result<Value, TaskError>> {
        Box::pin(async move {
            let id = task.id().to_string();
            self.dispatched.lock().unwrap().push(id.clone());

            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let _guard = RunningGuard(&self.running);

            let delay = self.delays.get(&id).copied().unwrap_or(self.default_delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let outcome = match self.behaviours.get(&id) {
                None => Ok(Value::String(id.clone())),
                Some(Behaviour::Succeed(value)) => Ok(value.clone()),
                Some(Behaviour::Fail(message)) => Err(TaskError::execution(message.clone())),
                Some(Behaviour::Panic) => panic!("scripted panic in task {id}"),
                Some(Behaviour::WaitForCancel) => {
                    ctx.cancelled().await;
                    Err(TaskError::Canceled)
                }
            };

            self.finished.lock().unwrap().push(id);
            outcome
        })
    }
}

#[derive(Debug, Clone)]
enum Verdicts {
    /// Satisfied once at least this many tasks have succeeded.
    AfterSucceeded(usize),
    /// Returned in order; the last one repeats.
    Sequence(VecDeque<Result<bool, GoalCheckError>>),
}

/// A fake goal checker that records how often and when it was consulted.
#[derive(Debug)]
pub struct ScriptedGoalChecker {
    verdicts: Mutex<Verdicts>,
    /// Succeeded-task count observed at each check.
    checks: Mutex<Vec<usize>>,
}

impl ScriptedGoalChecker {
    pub fn always(satisfied: bool) -> Self {
        Self::sequence(vec![Ok(satisfied)])
    }

    pub fn failing(message: &str) -> Self {
        Self::sequence(vec![Err(GoalCheckError(message.to_string()))])
    }

    pub fn satisfied_after(succeeded: usize) -> Self {
        Self {
            verdicts: Mutex::new(Verdicts::AfterSucceeded(succeeded)),
            checks: Mutex::new(Vec::new()),
        }
    }

    pub fn sequence(verdicts: Vec<Result<bool, GoalCheckError>>) -> Self {
        Self {
            verdicts: Mutex::new(Verdicts::Sequence(verdicts.into())),
            checks: Mutex::new(Vec::new()),
        }
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.checks.lock().unwrap().len()
    }

    /// Succeeded-task count at each check, in call order.
    pub fn checks(&self) -> Vec<usize> {
        self.checks.lock().unwrap().clone()
    }
}

impl GoalChecker for ScriptedGoalChecker {
    fn check_goal<'a>(
        &'a self,
        _ctx: CancellationToken,
        plan: &'a Plan,
    ) -> BoxFuture<'a, Result<bool, GoalCheckError>> {
        Box::pin(async move {
            let succeeded = plan.count_with_status(TaskStatus::Succeeded);
            self.checks.lock().unwrap().push(succeeded);

            let mut verdicts = self.verdicts.lock().unwrap();
            match &mut *verdicts {
                Verdicts::AfterSucceeded(n) => Ok(succeeded >= *n),
                Verdicts::Sequence(queue) => {
                    if queue.len() > 1 {
                        queue.pop_front().unwrap_or(Ok(false))
                    } else {
                        queue.front().cloned().unwrap_or(Ok(false))
                    }
                }
            }
        })
    }
}
