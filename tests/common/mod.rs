#![allow(dead_code)]

//! Shared helpers for integration tests.

pub use planflow_test_utils::builders;
pub use planflow_test_utils::{
    ConfigFileBuilder, PlanBuilder, ScriptedExecutor, ScriptedGoalChecker, TaskConfigBuilder,
    init_tracing, with_timeout,
};
