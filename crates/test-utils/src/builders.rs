#![allow(dead_code)]

use indexmap::IndexMap;
use planflow::config::{ConfigFile, ConfigSection, PlanSection, RawConfigFile, TaskConfig};
use planflow::dag::{Plan, Task};
use planflow::errors::Result;
use planflow::types::{FailurePolicy, StrategyKind};

/// Builder for domain `Plan`s.
///
/// ```ignore
/// let plan = PlanBuilder::new("p")
///     .task("a", &[])
///     .task("b", &["a"])
///     .build();
/// ```
pub struct PlanBuilder {
    id: String,
    goal: Option<String>,
    tasks: Vec<Task>,
}

impl PlanBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            goal: None,
            tasks: Vec::new(),
        }
    }

    pub fn goal(mut self, goal: &str) -> Self {
        self.goal = Some(goal.to_string());
        self
    }

    pub fn task(mut self, id: &str, after: &[&str]) -> Self {
        self.tasks
            .push(Task::new(id, format!("task {id}")).with_dependencies(after.iter().copied()));
        self
    }

    /// `count` tasks named `t0..t{count-1}` with no dependencies.
    pub fn independent(mut self, count: usize) -> Self {
        for i in 0..count {
            self = self.task(&format!("t{i}"), &[]);
        }
        self
    }

    /// `len` tasks named `c0..c{len-1}`, each depending on the previous.
    pub fn chain(mut self, len: usize) -> Self {
        for i in 0..len {
            let id = format!("c{i}");
            if i == 0 {
                self = self.task(&id, &[]);
            } else {
                let prev = format!("c{}", i - 1);
                self = self.task(&id, &[prev.as_str()]);
            }
        }
        self
    }

    pub fn try_build(self) -> Result<Plan> {
        let mut plan = Plan::new(self.id);
        if let Some(goal) = self.goal {
            plan = plan.with_goal(goal);
        }
        for task in self.tasks {
            plan.add_task(task)?;
        }
        Ok(plan)
    }

    pub fn build(self) -> Plan {
        self.try_build().expect("Failed to build plan from builder")
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                plan: PlanSection::default(),
                task: IndexMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.config.config.strategy = strategy;
        self
    }

    pub fn max_parallel(mut self, n: usize) -> Self {
        self.config.config.max_parallel = n;
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.config.config.timeout = Some(timeout.to_string());
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.config.failure_policy = policy;
        self
    }

    pub fn plan_id(mut self, id: &str) -> Self {
        self.config.plan.id = Some(id.to_string());
        self
    }

    pub fn goal(mut self, goal: &str) -> Self {
        self.config.plan.goal = Some(goal.to_string());
        self
    }

    pub fn goal_check(mut self, cmd: &str) -> Self {
        self.config.plan.goal_check = Some(cmd.to_string());
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                description: String::new(),
                cmd: Some(cmd.to_string()),
                after: vec![],
            },
        }
    }

    /// A task with no command (a no-op for the shell executor).
    pub fn noop() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.task.description = description.to_string();
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
