// src/config/validate.rs

use std::collections::{HashMap, HashSet};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use uuid::Uuid;

use crate::config::model::{ConfigFile, RawConfigFile, parse_duration};
use crate::dag::{Plan, Task, TaskId};
use crate::engine::ExecutorConfig;
use crate::errors::{PlanError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PlanError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.plan, raw.task))
    }
}

/// Validate an already-constructed `ConfigFile` again, e.g. after CLI
/// overrides were applied to its `[config]` section.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    cfg.executor_config()?.validate()
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global_config(cfg)?;
    validate_task_ids(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.max_parallel == 0 {
        return Err(PlanError::ConfigError(
            "[config].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&cfg.config.adaptive_threshold) {
        return Err(PlanError::ConfigError(format!(
            "[config].adaptive_threshold must be within 0.0..=1.0 (got {})",
            cfg.config.adaptive_threshold
        )));
    }
    if cfg.config.adaptive_window == 0 {
        return Err(PlanError::ConfigError(
            "[config].adaptive_window must be >= 1 (got 0)".to_string(),
        ));
    }
    if let Some(ref timeout) = cfg.config.timeout {
        parse_duration(timeout)
            .map_err(|e| PlanError::ConfigError(format!("[config].timeout: {e}")))?;
    }
    Ok(())
}

fn validate_task_ids(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.keys().any(|name| name.trim().is_empty()) {
        return Err(PlanError::ConfigError(
            "task names must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(PlanError::SelfDependency(name.clone()));
            }
            if !cfg.task.contains_key(dep) {
                return Err(PlanError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task, so `[task.B] after = ["A"]` adds A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            let component: HashSet<&str> = tarjan_scc(&graph)
                .into_iter()
                .find(|scc| scc.contains(&node))
                .map(|scc| scc.into_iter().collect())
                .unwrap_or_default();
            Err(PlanError::CycleDetected {
                cycle: cycle_through(cfg, node, &component),
                task: node.to_string(),
            })
        }
    }
}

/// Follow `after` edges that stay inside `component` (the strongly connected
/// component holding `start`) until a task repeats, returning the closed
/// loop (first and last element equal).
fn cycle_through(cfg: &RawConfigFile, start: &str, component: &HashSet<&str>) -> Vec<TaskId> {
    let mut path: Vec<&str> = vec![start];
    let mut seen: HashMap<&str, usize> = HashMap::from([(start, 0)]);
    let mut current = start;

    loop {
        let Some(task) = cfg.task.get(current) else {
            break;
        };
        let mut on_cycle = task
            .after
            .iter()
            .map(String::as_str)
            .filter(|dep| component.contains(dep));
        // Prefer a dependency we have already visited, so the walk closes.
        let next = on_cycle
            .clone()
            .find(|dep| seen.contains_key(dep))
            .or_else(|| on_cycle.next());
        let Some(next) = next else {
            break;
        };
        if let Some(&pos) = seen.get(next) {
            let mut cycle: Vec<TaskId> = path[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(next.to_string());
            return cycle;
        }
        seen.insert(next, path.len());
        path.push(next);
        current = next;
    }

    vec![start.to_string(), start.to_string()]
}

impl ConfigFile {
    /// Build the domain plan, tasks in file order.
    ///
    /// A plan without `[plan].id` gets a random UUID.
    pub fn to_plan(&self) -> Result<Plan> {
        let id = self
            .plan
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut plan = Plan::new(id);
        if let Some(ref goal) = self.plan.goal {
            plan = plan.with_goal(goal.clone());
        }

        for (name, task) in self.task.iter() {
            let description = if task.description.is_empty() {
                task.cmd.clone().unwrap_or_default()
            } else {
                task.description.clone()
            };
            plan.add_task(
                Task::new(name.clone(), description).with_dependencies(task.after.iter().cloned()),
            )?;
        }

        Ok(plan)
    }

    /// Executor settings from the `[config]` section.
    pub fn executor_config(&self) -> Result<ExecutorConfig> {
        let section = &self.config;
        let timeout = section
            .timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
            .map_err(|e| PlanError::ConfigError(format!("[config].timeout: {e}")))?;

        Ok(ExecutorConfig {
            strategy: section.strategy,
            max_parallel: section.max_parallel,
            adaptive_threshold: section.adaptive_threshold,
            adaptive_window: section.adaptive_window,
            goal_check_interval: section.goal_check_interval,
            timeout,
            failure_policy: section.failure_policy,
            stop_when_goal_met: section.stop_when_goal_met,
        })
    }

    /// Shell commands per task, for [`crate::exec::ShellTaskExecutor`].
    pub fn commands(&self) -> HashMap<TaskId, String> {
        self.task
            .iter()
            .filter_map(|(name, task)| task.cmd.clone().map(|cmd| (name.clone(), cmd)))
            .collect()
    }

    pub fn goal_check(&self) -> Option<&str> {
        self.plan.goal_check.as_deref()
    }
}
