// tests/cli_args.rs

use clap::Parser;

use planflow::cli::{CliArgs, LogLevel, StrategyArg};
use planflow::logging::filter_from_env;
use planflow::types::StrategyKind;

#[test]
fn defaults_point_at_planflow_toml() {
    let args = CliArgs::try_parse_from(["planflow"]).unwrap();
    assert_eq!(args.plan, "Planflow.toml");
    assert!(args.strategy.is_none());
    assert!(args.max_parallel.is_none());
    assert!(args.timeout.is_none());
    assert!(!args.dry_run);
    assert!(!args.json);
}

#[test]
fn overrides_are_parsed() {
    let args = CliArgs::try_parse_from([
        "planflow",
        "--plan",
        "ci/Planflow.toml",
        "--strategy",
        "parallel",
        "--max-parallel",
        "8",
        "--timeout",
        "90s",
        "--log-level",
        "debug",
        "--dry-run",
        "--json",
    ])
    .unwrap();

    assert_eq!(args.plan, "ci/Planflow.toml");
    assert_eq!(args.strategy, Some(StrategyArg::Parallel));
    assert_eq!(args.strategy.map(StrategyKind::from), Some(StrategyKind::Parallel));
    assert_eq!(args.max_parallel, Some(8));
    assert_eq!(args.timeout.as_deref(), Some("90s"));
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    assert!(args.dry_run);
    assert!(args.json);
}

#[test]
fn unknown_strategy_is_rejected() {
    assert!(CliArgs::try_parse_from(["planflow", "--strategy", "fastest"]).is_err());
}

#[test]
fn log_filter_falls_back_to_info() {
    let render = |v: Option<&str>| filter_from_env(v).to_string().to_lowercase();
    assert_eq!(render(None), "info");
    assert_eq!(render(Some("  ")), "info");
    assert!(render(Some("DEBUG")).contains("debug"));
    assert!(render(Some("planflow::engine=trace")).contains("planflow::engine"));
}
