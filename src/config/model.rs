// src/config/model.rs

use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::engine::options::{
    DEFAULT_ADAPTIVE_THRESHOLD, DEFAULT_ADAPTIVE_WINDOW, DEFAULT_MAX_PARALLEL,
};
use crate::types::{FailurePolicy, StrategyKind};

/// Plan file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// strategy = "parallel"
/// max_parallel = 4
///
/// [plan]
/// goal = "ship the release"
///
/// [task.build]
/// cmd = "cargo build"
///
/// [task.test]
/// cmd = "cargo test"
/// after = ["build"]
/// ```
///
/// All sections are optional and have reasonable defaults. Tasks keep the
/// order in which they appear in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub plan: PlanSection,

    #[serde(default)]
    pub task: IndexMap<String, TaskConfig>,
}

/// A plan file that passed validation. Construct via
/// `ConfigFile::try_from(raw)` or [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub plan: PlanSection,
    pub task: IndexMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        plan: PlanSection,
        task: IndexMap<String, TaskConfig>,
    ) -> Self {
        Self { config, plan, task }
    }
}

/// `[config]` section: how the plan is executed.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// `"sequential"`, `"parallel"` or `"adaptive"` (default).
    #[serde(default)]
    pub strategy: StrategyKind,

    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    #[serde(default = "default_adaptive_threshold")]
    pub adaptive_threshold: f64,

    #[serde(default = "default_adaptive_window")]
    pub adaptive_window: usize,

    /// Check the goal every N completed tasks; 0 checks only at the end.
    #[serde(default)]
    pub goal_check_interval: usize,

    /// Duration string (e.g. `"30s"`, `"500ms"`, `"2m"`) for the whole run.
    #[serde(default)]
    pub timeout: Option<String>,

    /// `"continue"` (default) or `"abort"`.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default = "default_true")]
    pub stop_when_goal_met: bool,
}

fn default_max_parallel() -> usize {
    DEFAULT_MAX_PARALLEL
}

fn default_adaptive_threshold() -> f64 {
    DEFAULT_ADAPTIVE_THRESHOLD
}

fn default_adaptive_window() -> usize {
    DEFAULT_ADAPTIVE_WINDOW
}

fn default_true() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            max_parallel: default_max_parallel(),
            adaptive_threshold: default_adaptive_threshold(),
            adaptive_window: default_adaptive_window(),
            goal_check_interval: 0,
            timeout: None,
            failure_policy: FailurePolicy::default(),
            stop_when_goal_met: true,
        }
    }
}

/// `[plan]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PlanSection {
    /// Plan id; a random one is generated when omitted.
    #[serde(default)]
    pub id: Option<String>,

    /// Human description of what the plan achieves.
    #[serde(default)]
    pub goal: Option<String>,

    /// Shell command judging the goal; exit status 0 means satisfied.
    #[serde(default)]
    pub goal_check: Option<String>,
}

/// `[task.<id>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    #[serde(default)]
    pub description: String,

    /// Command run by the shell executor. Tasks without one are no-ops.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,
}

/// Parse durations such as `"500ms"`, `"30s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => secs_times(value, 60),
        "h" => secs_times(value, 60 * 60),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

fn secs_times(value: u64, factor: u64) -> Result<Duration, String> {
    value
        .checked_mul(factor)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration too large: {value} * {factor}s"))
}
