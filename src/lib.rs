// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod strategy;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::config::validate_config;
use crate::dag::{TaskStatus, dependency_levels, topological_order};
use crate::engine::{PlanExecutor, PlanResult};
use crate::exec::{ShellGoalChecker, ShellTaskExecutor};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan file loading and CLI overrides
/// - shell executor and optional goal checker
/// - Ctrl-C handling
/// - result reporting
///
/// Returns `Ok(true)` when every task succeeded (or was skipped because the
/// goal was already met), `Ok(false)` when any task failed.
pub async fn run(args: CliArgs) -> Result<bool> {
    let plan_path = PathBuf::from(&args.plan);
    let mut cfg = load_and_validate(&plan_path)
        .with_context(|| format!("loading plan file {}", plan_path.display()))?;

    apply_overrides(&mut cfg, &args);
    validate_config(&cfg)?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(true);
    }

    let plan = cfg.to_plan()?;
    let exec_config = cfg.executor_config()?;

    let mut executor = PlanExecutor::new(Arc::new(ShellTaskExecutor::new(cfg.commands())));
    if let Some(cmd) = cfg.goal_check() {
        executor = executor.with_goal_checker(Arc::new(ShellGoalChecker::new(cmd)));
    }

    // Ctrl-C → stop dispatching; running tasks are killed by the executor.
    let ctx = CancellationToken::new();
    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; canceling run");
            ctx.cancel();
        });
    }

    let result = executor.execute(ctx, plan, &exec_config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    Ok(!result.has_failures())
}

fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) {
    if let Some(strategy) = args.strategy {
        cfg.config.strategy = strategy.into();
    }
    if let Some(max_parallel) = args.max_parallel {
        cfg.config.max_parallel = max_parallel;
    }
    if let Some(ref timeout) = args.timeout {
        cfg.config.timeout = Some(timeout.clone());
    }
}

/// Print strategy, execution order and levels without running anything.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    let plan = cfg.to_plan()?;
    let order = topological_order(&plan)?;
    let levels = dependency_levels(&plan)?;

    println!("planflow dry-run");
    if let Some(goal) = plan.goal() {
        println!("  goal = {goal}");
    }
    println!("  config.strategy = {}", cfg.config.strategy);
    println!("  config.max_parallel = {}", cfg.config.max_parallel);
    println!("  config.failure_policy = {:?}", cfg.config.failure_policy);
    if let Some(ref timeout) = cfg.config.timeout {
        println!("  config.timeout = {timeout}");
    }
    println!();

    println!("order ({}):", order.len());
    for (n, id) in order.iter().enumerate() {
        match cfg.task.get(id).and_then(|t| t.cmd.as_deref()) {
            Some(cmd) => println!("  {:>3}. {id}: {cmd}", n + 1),
            None => println!("  {:>3}. {id}", n + 1),
        }
    }
    println!();

    println!("levels ({}):", levels.len());
    for (n, level) in levels.iter().enumerate() {
        println!("  {n}: {}", level.join(", "));
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_summary(result: &PlanResult) {
    println!("plan {}", result.plan_id);
    if let Some(ref goal) = result.goal {
        println!("  goal: {goal}");
    }

    for task in &result.tasks {
        let marker = match task.status {
            TaskStatus::Succeeded => "ok",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Pending | TaskStatus::Running => "?",
        };
        match (&task.error, task.duration) {
            (Some(err), _) => println!("  [{marker}] {}: {err}", task.id),
            (None, Some(d)) => println!("  [{marker}] {} ({}ms)", task.id, d.as_millis()),
            (None, None) => println!("  [{marker}] {}", task.id),
        }
    }

    let m = &result.metrics;
    println!();
    println!(
        "{} tasks: {} succeeded, {} failed, {} skipped ({:.0}% success) in {}ms",
        m.task_count,
        m.success_count,
        m.failure_count,
        m.skipped_count,
        m.success_rate * 100.0,
        m.execution_time.as_millis()
    );
    println!("final strategy: {}", result.final_strategy);
    if let Some(satisfied) = result.goal_satisfied {
        println!("goal satisfied: {satisfied}");
    }
    if let Some(reason) = result.stop_reason {
        println!("stopped early: {reason:?}");
    }
}
