// tests/strategies.rs

mod common;
use crate::common::{PlanBuilder, ScriptedExecutor, init_tracing, with_timeout};

use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use planflow::dag::{Plan, TaskStatus, topological_order};
use planflow::engine::{ExecutorConfig, PlanExecutor, PlanResult, TimelineEventKind};
use planflow::errors::PlanError;
use planflow::types::StrategyKind;

type TestResult = Result<(), Box<dyn Error>>;

const ALL_STRATEGIES: [StrategyKind; 3] = [
    StrategyKind::Sequential,
    StrategyKind::Parallel,
    StrategyKind::Adaptive,
];

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

async fn run(plan: Plan, executor: &Arc<ScriptedExecutor>, config: &ExecutorConfig) -> PlanResult {
    with_timeout(PlanExecutor::new(executor.clone()).execute(
        CancellationToken::new(),
        plan,
        config,
    ))
    .await
    .expect("plan should be valid")
}

fn diamond() -> Plan {
    PlanBuilder::new("diamond")
        .task("a", &[])
        .task("b", &["a"])
        .task("c", &["a"])
        .task("d", &["b", "c"])
        .build()
}

fn statuses(result: &PlanResult) -> BTreeMap<String, TaskStatus> {
    result
        .tasks
        .iter()
        .map(|t| (t.id.clone(), t.status))
        .collect()
}

/// Index of the first timeline event of `kind` for `subject`.
fn event_index(result: &PlanResult, kind: TimelineEventKind, subject: &str) -> usize {
    result
        .timeline
        .iter()
        .position(|e| e.kind == kind && e.subject == subject)
        .unwrap_or_else(|| panic!("no {kind:?} event for {subject}"))
}

fn assert_dependencies_finished_first(result: &PlanResult) {
    for task in &result.tasks {
        if task.status == TaskStatus::Skipped {
            continue;
        }
        let started = event_index(result, TimelineEventKind::TaskStarted, &task.id);
        for dep in &task.dependencies {
            let done = event_index(result, TimelineEventKind::TaskCompleted, dep);
            assert!(done < started, "{} started before {} completed", task.id, dep);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn sequential_follows_topological_order() -> TestResult {
    init_tracing();
    let plan = diamond();
    let expected = topological_order(&plan)?;
    let executor = ScriptedExecutor::new().default_delay(ms(10)).into_arc();
    let config = ExecutorConfig::default().with_strategy(StrategyKind::Sequential);

    let result = run(plan, &executor, &config).await;

    assert_eq!(executor.dispatch_order(), expected);
    assert_eq!(executor.peak_concurrency(), 1);
    assert_eq!(result.metrics.success_count, 4);
    assert_eq!(result.metrics.success_rate, 1.0);
    assert_eq!(result.final_strategy, StrategyKind::Sequential);
    assert_eq!(result.task("d").and_then(|t| t.result.clone()), Some("d".into()));
    assert_dependencies_finished_first(&result);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn parallel_runs_each_level_concurrently() -> TestResult {
    init_tracing();
    let executor = ScriptedExecutor::new().default_delay(ms(10)).into_arc();
    let config = ExecutorConfig::default().with_strategy(StrategyKind::Parallel);

    let result = run(diamond(), &executor, &config).await;

    let order = executor.dispatch_order();
    assert_eq!(order.first().map(String::as_str), Some("a"));
    assert_eq!(order.last().map(String::as_str), Some("d"));
    assert_eq!(executor.peak_concurrency(), 2);
    assert_eq!(result.metrics.success_count, 4);
    assert_eq!(result.final_strategy, StrategyKind::Parallel);
    assert_dependencies_finished_first(&result);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn parallel_with_one_slot_is_sequential() -> TestResult {
    let executor = ScriptedExecutor::new().default_delay(ms(10)).into_arc();
    let config = ExecutorConfig::default()
        .with_strategy(StrategyKind::Parallel)
        .with_max_parallel(1);

    let result = run(PlanBuilder::new("wide").independent(5).build(), &executor, &config).await;

    assert_eq!(executor.peak_concurrency(), 1);
    assert_eq!(executor.dispatch_order(), vec!["t0", "t1", "t2", "t3", "t4"]);
    assert_eq!(result.metrics.success_count, 5);
    assert!(result.metrics.execution_time >= ms(50));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn independent_tasks_overlap_in_time() -> TestResult {
    let executor = ScriptedExecutor::new().default_delay(ms(100)).into_arc();
    let config = ExecutorConfig::default()
        .with_strategy(StrategyKind::Parallel)
        .with_max_parallel(5);

    let result = run(PlanBuilder::new("wide").independent(5).build(), &executor, &config).await;

    assert_eq!(executor.peak_concurrency(), 5);
    assert_eq!(result.metrics.success_count, 5);
    assert!(result.metrics.execution_time >= ms(100));
    assert!(
        result.metrics.execution_time < ms(200),
        "expected overlap, took {:?}",
        result.metrics.execution_time
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn concurrency_never_exceeds_max_parallel() -> TestResult {
    let executor = ScriptedExecutor::new().default_delay(ms(10)).into_arc();
    let config = ExecutorConfig::default()
        .with_strategy(StrategyKind::Parallel)
        .with_max_parallel(3);

    let result = run(PlanBuilder::new("wide").independent(10).build(), &executor, &config).await;

    assert_eq!(executor.peak_concurrency(), 3);
    assert_eq!(result.metrics.success_count, 10);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failure_skips_dependents_under_every_strategy() -> TestResult {
    for strategy in ALL_STRATEGIES {
        let plan = PlanBuilder::new("fail")
            .task("a", &[])
            .task("b", &[])
            .task("c", &["a"])
            .build();
        let executor = ScriptedExecutor::new().fail("a", "exploded").into_arc();
        let config = ExecutorConfig::default().with_strategy(strategy);

        let result = run(plan, &executor, &config).await;

        assert_eq!(result.status_of("a"), Some(TaskStatus::Failed), "{strategy}");
        assert_eq!(result.status_of("b"), Some(TaskStatus::Succeeded), "{strategy}");
        assert_eq!(result.status_of("c"), Some(TaskStatus::Skipped), "{strategy}");
        assert_eq!(result.metrics.failure_count, 1);
        assert_eq!(result.metrics.success_count, 1);
        assert_eq!(result.metrics.skipped_count, 1);
        assert!(result.has_failures());
        assert!(!executor.dispatch_order().contains(&"c".to_string()));
        assert_eq!(
            result.task("a").and_then(|t| t.error.clone()).as_deref(),
            Some("task execution failed: exploded")
        );
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn transitive_dependents_are_skipped_once() -> TestResult {
    let plan = PlanBuilder::new("deep")
        .task("root", &[])
        .task("mid", &["root"])
        .task("leaf", &["mid"])
        .task("other", &[])
        .build();
    let executor = ScriptedExecutor::new().fail("root", "no").into_arc();
    let config = ExecutorConfig::default().with_strategy(StrategyKind::Sequential);

    let result = run(plan, &executor, &config).await;

    assert_eq!(executor.dispatch_order(), vec!["root", "other"]);
    let skip_events: Vec<&str> = result
        .timeline
        .iter()
        .filter(|e| e.kind == TimelineEventKind::TaskSkipped)
        .map(|e| e.subject.as_str())
        .collect();
    assert_eq!(skip_events, vec!["mid", "leaf"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn long_chain_runs_in_order_with_parallel_strategy() -> TestResult {
    let executor = ScriptedExecutor::new().default_delay(ms(1)).into_arc();
    let config = ExecutorConfig::default().with_strategy(StrategyKind::Parallel);

    let result = run(PlanBuilder::new("chain").chain(20).build(), &executor, &config).await;

    let expected: Vec<String> = (0..20).map(|i| format!("c{i}")).collect();
    assert_eq!(executor.dispatch_order(), expected);
    assert_eq!(result.metrics.success_count, 20);
    assert_eq!(executor.peak_concurrency(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn panicking_task_is_recorded_as_failed() -> TestResult {
    let plan = PlanBuilder::new("panic")
        .task("boom", &[])
        .task("after", &["boom"])
        .task("fine", &[])
        .build();
    let executor = ScriptedExecutor::new().panic_on("boom").into_arc();
    let config = ExecutorConfig::default().with_strategy(StrategyKind::Parallel);

    let result = run(plan, &executor, &config).await;

    assert_eq!(result.status_of("boom"), Some(TaskStatus::Failed));
    assert_eq!(result.status_of("after"), Some(TaskStatus::Skipped));
    assert_eq!(result.status_of("fine"), Some(TaskStatus::Succeeded));
    let error = result.task("boom").and_then(|t| t.error.clone()).unwrap_or_default();
    assert!(error.contains("panicked"), "unexpected error: {error}");
    Ok(())
}

#[tokio::test]
async fn empty_plan_succeeds_trivially() -> TestResult {
    for strategy in ALL_STRATEGIES {
        let executor = ScriptedExecutor::new().into_arc();
        let config = ExecutorConfig::default().with_strategy(strategy);

        let result = run(Plan::new("empty"), &executor, &config).await;

        assert_eq!(result.metrics.task_count, 0);
        assert_eq!(result.metrics.success_rate, 1.0);
        assert!(result.timeline.is_empty());
        assert_eq!(result.stop_reason, None);
        assert_eq!(executor.calls(), 0);
    }
    Ok(())
}

#[tokio::test]
async fn invalid_inputs_fail_before_dispatch() {
    let executor = ScriptedExecutor::new().into_arc();
    let plan_executor = PlanExecutor::new(executor.clone());

    let cyclic = PlanBuilder::new("c").task("a", &["b"]).task("b", &["a"]).build();
    let err = plan_executor
        .execute(CancellationToken::new(), cyclic, &ExecutorConfig::default())
        .await
        .expect_err("cycle must be rejected");
    assert!(matches!(err, PlanError::CycleDetected { .. }), "got {err:?}");

    let bad_config = ExecutorConfig::default().with_max_parallel(0);
    let err = plan_executor
        .execute(CancellationToken::new(), diamond(), &bad_config)
        .await
        .expect_err("max_parallel 0 must be rejected");
    assert!(matches!(err, PlanError::InvalidConfig(_)), "got {err:?}");

    let bad_threshold = ExecutorConfig::default().with_adaptive_threshold(1.5);
    assert!(matches!(
        plan_executor
            .execute(CancellationToken::new(), diamond(), &bad_threshold)
            .await,
        Err(PlanError::InvalidConfig(_))
    ));

    assert_eq!(executor.calls(), 0);
}

// ---------------------------------------------------------------------------
// Adaptive
// ---------------------------------------------------------------------------

/// Four-wide levels: a0..a3, then b_i after a_i, then c after b0.
fn wide_levels() -> Plan {
    let mut builder = PlanBuilder::new("adaptive");
    for i in 0..4 {
        builder = builder.task(&format!("a{i}"), &[]);
    }
    for i in 0..4 {
        let dep = format!("a{i}");
        builder = builder.task(&format!("b{i}"), &[dep.as_str()]);
    }
    builder.task("c", &["b0"]).build()
}

fn switches(result: &PlanResult) -> Vec<(String, String)> {
    result
        .timeline
        .iter()
        .filter(|e| e.kind == TimelineEventKind::StrategySwitched)
        .map(|e| (e.subject.clone(), e.content.clone()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn adaptive_switches_to_parallel_for_wide_levels() -> TestResult {
    init_tracing();
    let executor = ScriptedExecutor::new().default_delay(ms(10)).into_arc();
    let config = ExecutorConfig::default()
        .with_strategy(StrategyKind::Adaptive)
        .with_max_parallel(4)
        .with_adaptive_threshold(0.5);

    let result = run(wide_levels(), &executor, &config).await;

    let switches = switches(&result);
    assert_eq!(switches.len(), 1, "switches: {switches:?}");
    assert_eq!(switches[0].0, "parallel");
    assert!(switches[0].1.ends_with("before level 1"), "{}", switches[0].1);

    // Level 0 ran one at a time; level 1 ran all four together.
    assert_eq!(&executor.dispatch_order()[..4], ["a0", "a1", "a2", "a3"]);
    assert_eq!(executor.peak_concurrency(), 4);
    assert_eq!(result.final_strategy, StrategyKind::Parallel);
    assert_eq!(result.metrics.success_count, 9);
    assert_dependencies_finished_first(&result);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn adaptive_falls_back_when_parallel_does_not_pay_off() -> TestResult {
    // Level 1 tasks take four times as long as level 0 ones, so running them
    // together is no faster than the sequential baseline.
    let mut executor = ScriptedExecutor::new().default_delay(ms(10));
    for i in 0..4 {
        executor = executor.delay(&format!("b{i}"), ms(40));
    }
    let executor = executor.into_arc();
    let config = ExecutorConfig::default()
        .with_strategy(StrategyKind::Adaptive)
        .with_max_parallel(4)
        .with_adaptive_threshold(0.5);

    let result = run(wide_levels(), &executor, &config).await;

    let subjects: Vec<String> = switches(&result).into_iter().map(|(s, _)| s).collect();
    assert_eq!(subjects, vec!["parallel", "sequential"]);
    assert_eq!(result.final_strategy, StrategyKind::Sequential);
    assert_eq!(result.metrics.success_count, 9);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn adaptive_stays_sequential_for_chains() -> TestResult {
    let executor = ScriptedExecutor::new().default_delay(ms(10)).into_arc();
    let config = ExecutorConfig::default().with_strategy(StrategyKind::Adaptive);

    let result = run(PlanBuilder::new("chain").chain(5).build(), &executor, &config).await;

    assert!(switches(&result).is_empty());
    assert_eq!(result.final_strategy, StrategyKind::Sequential);
    assert_eq!(executor.peak_concurrency(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn adaptive_keeps_mode_when_efficiency_equals_threshold() -> TestResult {
    let executor = ScriptedExecutor::new().default_delay(ms(10)).into_arc();
    // Level 0 scores exactly 1 - 1/4 = 0.75.
    let config = ExecutorConfig::default()
        .with_strategy(StrategyKind::Adaptive)
        .with_max_parallel(4)
        .with_adaptive_threshold(0.75);

    let result = run(wide_levels(), &executor, &config).await;

    assert!(switches(&result).is_empty());
    assert_eq!(result.final_strategy, StrategyKind::Sequential);
    assert_eq!(executor.peak_concurrency(), 1);
    Ok(())
}

// ---------------------------------------------------------------------------
// Strategy equivalence
// ---------------------------------------------------------------------------

fn random_plan(raw_deps: Vec<Vec<usize>>) -> Plan {
    let mut builder = PlanBuilder::new("equiv");
    for (i, potential) in raw_deps.into_iter().enumerate() {
        let deps: HashSet<String> = if i == 0 {
            HashSet::new()
        } else {
            potential.into_iter().map(|d| format!("t{}", d % i)).collect()
        };
        let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
        builder = builder.task(&format!("t{i}"), &deps);
    }
    builder.build()
}

fn run_blocking(plan: Plan, failing: &HashSet<usize>, strategy: StrategyKind) -> PlanResult {
    let mut executor = ScriptedExecutor::new();
    for &i in failing {
        executor = executor.fail(&format!("t{i}"), "scripted failure");
    }
    let executor = executor.into_arc();
    let config = ExecutorConfig::default()
        .with_strategy(strategy)
        .with_max_parallel(3);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    rt.block_on(run(plan, &executor, &config))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn strategies_agree_on_final_statuses(
        raw_deps in proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..3), 1..10),
        failing in proptest::collection::hash_set(0..10usize, 0..3),
    ) {
        let plan = random_plan(raw_deps);

        let sequential = run_blocking(plan.clone(), &failing, StrategyKind::Sequential);
        let parallel = run_blocking(plan.clone(), &failing, StrategyKind::Parallel);
        let adaptive = run_blocking(plan, &failing, StrategyKind::Adaptive);

        prop_assert_eq!(statuses(&sequential), statuses(&parallel));
        prop_assert_eq!(statuses(&sequential), statuses(&adaptive));
        prop_assert_eq!(sequential.metrics.skipped_count, parallel.metrics.skipped_count);
    }
}
