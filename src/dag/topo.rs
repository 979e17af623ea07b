// src/dag/topo.rs

//! Topological ordering (Kahn's algorithm) and cycle reporting.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::dag::graph::DagGraph;
use crate::dag::plan::Plan;
use crate::dag::task::TaskId;
use crate::errors::{PlanError, Result};

/// Linear execution order of a plan: every task comes after all of its
/// dependencies.
///
/// Among tasks that are ready at the same time, the one added to the plan
/// first wins, so the result is deterministic for a given plan.
pub fn topological_order(plan: &Plan) -> Result<Vec<TaskId>> {
    let graph = DagGraph::build(plan)?;
    let order = sorted_indices(plan, &graph)?;
    Ok(order
        .into_iter()
        .map(|idx| plan.task_at(idx).id().to_string())
        .collect())
}

/// Index form of [`topological_order`] for callers that already built the
/// graph.
pub(crate) fn sorted_indices(plan: &Plan, graph: &DagGraph) -> Result<Vec<usize>> {
    let mut in_degree = graph.in_degrees();
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for &dependent in graph.dependents_of(idx) {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() < graph.len() {
        return Err(cycle_error(plan, graph, &in_degree));
    }

    debug!(plan = %plan.id(), tasks = order.len(), "topological order computed");
    Ok(order)
}

/// Build a `CycleDetected` error from the nodes Kahn's algorithm could not
/// release.
///
/// Every leftover node still has at least one leftover dependency, so
/// walking dependency edges from any of them must eventually revisit a node.
/// The reported cycle lists tasks such that each one depends on the next.
fn cycle_error(plan: &Plan, graph: &DagGraph, in_degree: &[usize]) -> PlanError {
    let stuck = |idx: usize| in_degree[idx] > 0;

    let Some(start) = (0..graph.len()).find(|&idx| stuck(idx)) else {
        return PlanError::Other(anyhow::anyhow!(
            "topological sort stalled without a blocked task"
        ));
    };

    let mut path: Vec<usize> = Vec::new();
    let mut position: Vec<Option<usize>> = vec![None; graph.len()];
    let mut current = start;

    let cycle_start = loop {
        if let Some(pos) = position[current] {
            break pos;
        }
        position[current] = Some(path.len());
        path.push(current);

        match graph
            .dependencies_of(current)
            .iter()
            .copied()
            .find(|&dep| stuck(dep))
        {
            Some(next) => current = next,
            // Unreachable for a stalled sort; report what we have.
            None => break 0,
        }
    };

    let mut cycle: Vec<TaskId> = path[cycle_start..]
        .iter()
        .map(|&idx| plan.task_at(idx).id().to_string())
        .collect();
    let task = cycle[0].clone();
    cycle.push(task.clone());

    PlanError::CycleDetected { task, cycle }
}
