// src/dag/graph.rs

use crate::dag::plan::Plan;
use crate::errors::{PlanError, Result};

/// Index-based adjacency view of a [`Plan`].
///
/// Tasks only store their forward dependency edges; the reverse edges
/// (dependents) are derived here each time the graph is built, so there is
/// no bidirectional structure to keep in sync. Node `i` is the task at
/// insertion index `i` in the plan.
#[derive(Debug, Clone)]
pub struct DagGraph {
    deps: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl DagGraph {
    /// Resolve every dependency id to an index and derive dependents.
    ///
    /// Fails with [`PlanError::UnknownDependency`] if a task names a
    /// dependency that is not in the plan. Cycles are *not* checked here.
    pub fn build(plan: &Plan) -> Result<Self> {
        let n = plan.len();
        let mut deps: Vec<Vec<usize>> = Vec::with_capacity(n);
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for task in plan.tasks() {
            let mut resolved = Vec::with_capacity(task.dependencies().len());
            for dep in task.dependencies() {
                let dep_idx =
                    plan.index_of(dep)
                        .ok_or_else(|| PlanError::UnknownDependency {
                            task: task.id().to_string(),
                            dependency: dep.clone(),
                        })?;
                resolved.push(dep_idx);
            }
            deps.push(resolved);
        }

        for (idx, task_deps) in deps.iter().enumerate() {
            for &dep in task_deps {
                dependents[dep].push(idx);
            }
        }

        Ok(Self { deps, dependents })
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, idx: usize) -> &[usize] {
        self.deps.get(idx).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list it as a dependency).
    pub fn dependents_of(&self, idx: usize) -> &[usize] {
        self.dependents
            .get(idx)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Number of incoming dependency edges per task.
    pub fn in_degrees(&self) -> Vec<usize> {
        self.deps.iter().map(|d| d.len()).collect()
    }
}
