use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Scheduling strategy used to drive a plan.
///
/// - `Sequential`: one task at a time in topological order.
/// - `Parallel`: dependency level by dependency level, bounded by
///   `max_parallel` within each level.
/// - `Adaptive`: starts sequential and switches per level based on observed
///   efficiency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Sequential,
    Parallel,
    Adaptive,
}

impl Default for StrategyKind {
    fn default() -> Self {
        StrategyKind::Adaptive
    }
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Sequential => "sequential",
            StrategyKind::Parallel => "parallel",
            StrategyKind::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(StrategyKind::Sequential),
            "parallel" => Ok(StrategyKind::Parallel),
            "adaptive" => Ok(StrategyKind::Adaptive),
            other => Err(format!(
                "invalid strategy: {other} (expected \"sequential\", \"parallel\" or \"adaptive\")"
            )),
        }
    }
}

/// What a task failure means for the rest of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep dispatching tasks that do not depend on the failed one.
    #[serde(alias = "continue_on_error")]
    Continue,
    /// Stop dispatching new tasks after the first failure. In-flight tasks
    /// still finish and are recorded.
    #[serde(alias = "abort_on_error")]
    Abort,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Continue
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" | "continue_on_error" => Ok(FailurePolicy::Continue),
            "abort" | "abort_on_error" => Ok(FailurePolicy::Abort),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"continue\" or \"abort\")"
            )),
        }
    }
}
