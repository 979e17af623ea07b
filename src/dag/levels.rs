// src/dag/levels.rs

//! Dependency-level grouping.

use crate::dag::graph::DagGraph;
use crate::dag::plan::Plan;
use crate::dag::task::TaskId;
use crate::dag::topo::sorted_indices;
use crate::errors::Result;

/// Partition the plan into levels of mutually independent tasks.
///
/// Roots are level 0 and every other task sits one level above its deepest
/// dependency. Inside a level, tasks keep their topological order.
pub fn dependency_levels(plan: &Plan) -> Result<Vec<Vec<TaskId>>> {
    let graph = DagGraph::build(plan)?;
    let order = sorted_indices(plan, &graph)?;
    Ok(level_indices(&graph, &order)
        .into_iter()
        .map(|level| {
            level
                .into_iter()
                .map(|idx| plan.task_at(idx).id().to_string())
                .collect()
        })
        .collect())
}

/// Assign levels given an already valid topological order.
pub(crate) fn level_indices(graph: &DagGraph, order: &[usize]) -> Vec<Vec<usize>> {
    let mut level_of: Vec<usize> = vec![0; graph.len()];
    let mut levels: Vec<Vec<usize>> = Vec::new();

    for &idx in order {
        let level = graph
            .dependencies_of(idx)
            .iter()
            .map(|&dep| level_of[dep] + 1)
            .max()
            .unwrap_or(0);
        level_of[idx] = level;

        if levels.len() <= level {
            levels.resize_with(level + 1, Vec::new);
        }
        levels[level].push(idx);
    }

    levels
}
