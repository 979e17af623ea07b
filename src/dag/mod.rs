// src/dag/mod.rs

//! Task graph representation and ordering.
//!
//! - [`task`] holds a single task and its per-run state.
//! - [`plan`] is the insertion-ordered collection of tasks.
//! - [`graph`] derives an index-based adjacency view (with dependents).
//! - [`topo`] computes a topological order and reports cycles.
//! - [`levels`] groups tasks into dependency levels.
//! - [`state_manager`] applies status transitions during a run.

pub mod graph;
pub mod levels;
pub mod plan;
pub mod state_manager;
pub mod task;
pub mod topo;

pub use graph::DagGraph;
pub use levels::dependency_levels;
pub use plan::Plan;
pub use state_manager::{Readiness, StateManager};
pub use task::{SkipReason, Task, TaskId, TaskStatus};
pub use topo::topological_order;
