// src/engine/options.rs

use std::time::Duration;

use crate::errors::{PlanError, Result};
use crate::types::{FailurePolicy, StrategyKind};

/// Knobs for a single plan execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Strategy used to drive the plan.
    pub strategy: StrategyKind,
    /// Upper bound on concurrently running tasks within a level.
    pub max_parallel: usize,
    /// Efficiency (0.0-1.0) above which the adaptive strategy runs levels in
    /// parallel, and below which it falls back to sequential.
    pub adaptive_threshold: f64,
    /// Number of recent level samples the performance tracker smooths over.
    pub adaptive_window: usize,
    /// Run the goal check every N completed tasks; 0 means only at the end.
    pub goal_check_interval: usize,
    /// Deadline for the whole run.
    pub timeout: Option<Duration>,
    pub failure_policy: FailurePolicy,
    /// Stop dispatching once a periodic goal check reports the goal as met.
    pub stop_when_goal_met: bool,
}

pub const DEFAULT_MAX_PARALLEL: usize = 4;
pub const DEFAULT_ADAPTIVE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_ADAPTIVE_WINDOW: usize = 3;

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            max_parallel: DEFAULT_MAX_PARALLEL,
            adaptive_threshold: DEFAULT_ADAPTIVE_THRESHOLD,
            adaptive_window: DEFAULT_ADAPTIVE_WINDOW,
            goal_check_interval: 0,
            timeout: None,
            failure_policy: FailurePolicy::default(),
            stop_when_goal_met: true,
        }
    }
}

impl ExecutorConfig {
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_adaptive_threshold(mut self, threshold: f64) -> Self {
        self.adaptive_threshold = threshold;
        self
    }

    pub fn with_goal_check_interval(mut self, interval: usize) -> Self {
        self.goal_check_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_parallel == 0 {
            return Err(PlanError::InvalidConfig(
                "max_parallel must be >= 1 (got 0)".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.adaptive_threshold) {
            return Err(PlanError::InvalidConfig(format!(
                "adaptive_threshold must be within 0.0..=1.0 (got {})",
                self.adaptive_threshold
            )));
        }
        if self.adaptive_window == 0 {
            return Err(PlanError::InvalidConfig(
                "adaptive_window must be >= 1 (got 0)".to_string(),
            ));
        }
        Ok(())
    }
}
