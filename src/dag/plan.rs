// src/dag/plan.rs

use std::collections::HashMap;

use crate::dag::task::{Task, TaskId, TaskStatus};
use crate::dag::topo::topological_order;
use crate::errors::{PlanError, Result};

/// A goal decomposed into a graph of tasks.
///
/// Tasks keep the order in which they were added; that order is the
/// tie-break for every ordering the scheduler derives from the plan.
#[derive(Debug, Clone)]
pub struct Plan {
    id: String,
    goal: Option<String>,
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
}

impl Plan {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            goal: None,
            tasks: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    /// Builder-style variant of [`Plan::add_task`].
    pub fn with_task(mut self, task: Task) -> Result<Self> {
        self.add_task(task)?;
        Ok(self)
    }

    /// Append a task. Dependencies may name tasks that are added later;
    /// they are resolved by [`Plan::validate`].
    pub fn add_task(&mut self, task: Task) -> Result<()> {
        if task.id().trim().is_empty() {
            return Err(PlanError::EmptyTaskId);
        }
        if self.index.contains_key(task.id()) {
            return Err(PlanError::DuplicateTask(task.id().to_string()));
        }
        if task.status() != TaskStatus::Pending {
            return Err(PlanError::ConfigError(format!(
                "task '{}' must be Pending when added to a plan",
                task.id()
            )));
        }

        self.index.insert(task.id().to_string(), self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    /// Check that every dependency exists and the graph is acyclic.
    pub fn validate(&self) -> Result<()> {
        topological_order(self).map(|_| ())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn goal(&self) -> Option<&str> {
        self.goal.as_deref()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&idx| &self.tasks[idx])
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Insertion index of a task.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Number of tasks currently in the given status.
    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status() == status).count()
    }

    pub(crate) fn task_at(&self, idx: usize) -> &Task {
        &self.tasks[idx]
    }

    pub(crate) fn task_at_mut(&mut self, idx: usize) -> &mut Task {
        &mut self.tasks[idx]
    }
}
