// tests/config_loading.rs

mod common;
use crate::common::{ConfigFileBuilder, TaskConfigBuilder};

use std::error::Error;
use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use planflow::config::{load_and_validate, load_from_path, parse_duration};
use planflow::dag::topological_order;
use planflow::errors::PlanError;
use planflow::types::{FailurePolicy, StrategyKind};

type TestResult = Result<(), Box<dyn Error>>;

fn write_plan(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_plan_file_round_trips_into_domain_types() -> TestResult {
    let file = write_plan(
        r#"
[config]
strategy = "parallel"
max_parallel = 2
adaptive_threshold = 0.6
goal_check_interval = 3
timeout = "2m"
failure_policy = "abort"
stop_when_goal_met = false

[plan]
id = "release-42"
goal = "ship the release"
goal_check = "test -f dist/app"

[task.test]
description = "unit tests"
cmd = "cargo test"
after = ["build"]

[task.build]
cmd = "cargo build"

[task.docs]
"#,
    );

    let cfg = load_and_validate(file.path())?;
    let exec = cfg.executor_config()?;
    assert_eq!(exec.strategy, StrategyKind::Parallel);
    assert_eq!(exec.max_parallel, 2);
    assert_eq!(exec.adaptive_threshold, 0.6);
    assert_eq!(exec.goal_check_interval, 3);
    assert_eq!(exec.timeout, Some(Duration::from_secs(120)));
    assert_eq!(exec.failure_policy, FailurePolicy::Abort);
    assert!(!exec.stop_when_goal_met);

    let plan = cfg.to_plan()?;
    assert_eq!(plan.id(), "release-42");
    assert_eq!(plan.goal(), Some("ship the release"));
    // File order is insertion order.
    let ids: Vec<&str> = plan.tasks().iter().map(|t| t.id()).collect();
    assert_eq!(ids, vec!["test", "build", "docs"]);
    assert_eq!(plan.task("test").map(|t| t.description()), Some("unit tests"));
    // Description falls back to the command.
    assert_eq!(plan.task("build").map(|t| t.description()), Some("cargo build"));
    assert_eq!(topological_order(&plan)?, vec!["build", "test", "docs"]);

    let commands = cfg.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands.get("build").map(String::as_str), Some("cargo build"));
    assert!(!commands.contains_key("docs"));
    assert_eq!(cfg.goal_check(), Some("test -f dist/app"));
    Ok(())
}

#[test]
fn defaults_apply_when_sections_are_missing() -> TestResult {
    let file = write_plan(
        r#"
[task.only]
cmd = "true"
"#,
    );

    let cfg = load_and_validate(file.path())?;
    let exec = cfg.executor_config()?;
    assert_eq!(exec.strategy, StrategyKind::Adaptive);
    assert_eq!(exec.max_parallel, 4);
    assert_eq!(exec.adaptive_threshold, 0.5);
    assert_eq!(exec.adaptive_window, 3);
    assert_eq!(exec.goal_check_interval, 0);
    assert_eq!(exec.timeout, None);
    assert_eq!(exec.failure_policy, FailurePolicy::Continue);
    assert!(exec.stop_when_goal_met);

    // A missing id is generated, and differs per conversion.
    let first = cfg.to_plan()?;
    let second = cfg.to_plan()?;
    assert!(!first.id().is_empty());
    assert_ne!(first.id(), second.id());
    assert_eq!(cfg.goal_check(), None);
    Ok(())
}

#[test]
fn failure_policy_accepts_long_aliases() -> TestResult {
    let file = write_plan(
        r#"
[config]
failure_policy = "abort_on_error"

[task.a]
cmd = "true"
"#,
    );
    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.config.failure_policy, FailurePolicy::Abort);
    Ok(())
}

#[test]
fn dag_cycle_returns_structured_error() {
    let file = write_plan(
        r#"
[task.A]
cmd = "echo A"
after = ["B"]

[task.B]
cmd = "echo B"
after = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(PlanError::CycleDetected { task, cycle }) => {
            assert!(task == "A" || task == "B");
            assert_eq!(cycle.first(), cycle.last());
            assert!(cycle.contains(&"A".to_string()));
            assert!(cycle.contains(&"B".to_string()));
        }
        Err(e) => panic!("Expected CycleDetected error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn reported_cycle_never_leaves_the_loop() {
    // `A` lists an acyclic dependency first; the reported loop must skip it.
    let file = write_plan(
        r#"
[task.X]
cmd = "echo X"

[task.A]
cmd = "echo A"
after = ["X", "B"]

[task.B]
cmd = "echo B"
after = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(PlanError::CycleDetected { task, cycle }) => {
            assert!(task == "A" || task == "B");
            assert_eq!(cycle.len(), 3, "{cycle:?}");
            assert_eq!(cycle.first(), cycle.last());
            assert!(!cycle.contains(&"X".to_string()), "{cycle:?}");
        }
        Err(e) => panic!("Expected CycleDetected error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn unknown_dependency_returns_config_error() {
    let file = write_plan(
        r#"
[task.A]
cmd = "echo A"
after = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(PlanError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn self_dependency_is_named_explicitly() {
    let raw = ConfigFileBuilder::new()
        .with_task("loop", TaskConfigBuilder::new("true").after("loop").build())
        .try_build();

    match raw {
        Err(PlanError::SelfDependency(task)) => assert_eq!(task, "loop"),
        other => panic!("Expected SelfDependency, got: {:?}", other.map(|_| ())),
    }
}

#[test]
fn out_of_range_settings_are_rejected() {
    let cases = [
        ConfigFileBuilder::new().max_parallel(0),
        ConfigFileBuilder::new().timeout("soon"),
        ConfigFileBuilder::new().timeout("10"),
    ];
    for builder in cases {
        let result = builder
            .with_task("a", TaskConfigBuilder::new("true").build())
            .try_build();
        assert!(
            matches!(result, Err(PlanError::ConfigError(_))),
            "expected ConfigError, got {:?}",
            result.map(|_| ())
        );
    }

    let mut raw = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("true").build())
        .build_raw();
    raw.config.adaptive_threshold = 1.2;
    assert!(matches!(
        planflow::config::ConfigFile::try_from(raw),
        Err(PlanError::ConfigError(msg)) if msg.contains("adaptive_threshold")
    ));
}

#[test]
fn huge_timeout_is_accepted() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .timeout("18446744073709551615s")
        .with_task("a", TaskConfigBuilder::new("true").build())
        .try_build()?;
    assert_eq!(cfg.executor_config()?.timeout, Some(Duration::from_secs(u64::MAX)));
    Ok(())
}

#[test]
fn empty_task_table_is_a_valid_empty_plan() -> TestResult {
    let file = write_plan("[config]\nstrategy = \"sequential\"\n");
    let cfg = load_and_validate(file.path())?;
    assert!(cfg.to_plan()?.is_empty());
    Ok(())
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = write_plan("[task.a\ncmd = ");
    assert!(matches!(load_from_path(file.path()), Err(PlanError::TomlError(_))));
}

#[test]
fn unknown_strategy_is_rejected_during_parsing() {
    let file = write_plan("[config]\nstrategy = \"random\"\n");
    assert!(matches!(load_from_path(file.path()), Err(PlanError::TomlError(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        load_and_validate("/definitely/not/here/Planflow.toml"),
        Err(PlanError::IoError(_))
    ));
}

#[test]
fn durations_parse_with_units() {
    assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
    assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
    assert_eq!(parse_duration(" 2m "), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert_eq!(parse_duration("1S"), Ok(Duration::from_secs(1)));

    assert!(parse_duration("").is_err());
    assert!(parse_duration("15").is_err());
    assert!(parse_duration("5d").is_err());
    assert!(parse_duration("ms").is_err());

    // Overflowing unit conversions are errors, not panics.
    assert!(parse_duration("400000000000000000m").is_err());
    assert!(parse_duration("18446744073709551615h").is_err());
    assert_eq!(
        parse_duration("18446744073709551615s"),
        Ok(Duration::from_secs(u64::MAX))
    );
}
