// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::StrategyKind;

/// Command-line arguments for `planflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "planflow",
    version,
    about = "Execute a DAG of tasks with sequential, parallel or adaptive scheduling.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan file (TOML).
    ///
    /// Default: `Planflow.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Planflow.toml")]
    pub plan: String,

    /// Override `[config].strategy`.
    #[arg(long, value_enum, value_name = "STRATEGY")]
    pub strategy: Option<StrategyArg>,

    /// Override `[config].max_parallel`.
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Override `[config].timeout` (e.g. "30s", "500ms", "2m").
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PLANFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print execution order and levels, but don't run
    /// any commands.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run result as JSON on stdout instead of a summary.
    #[arg(long)]
    pub json: bool,
}

/// Strategy as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Sequential,
    Parallel,
    Adaptive,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Sequential => StrategyKind::Sequential,
            StrategyArg::Parallel => StrategyKind::Parallel,
            StrategyArg::Adaptive => StrategyKind::Adaptive,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
