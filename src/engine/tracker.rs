// src/engine/tracker.rs

//! Rolling performance measurement for the adaptive strategy.
//!
//! Observations travel over an unbounded channel into a single owner, so any
//! number of [`TrackerHandle`] clones may report concurrently without ever
//! losing a sample. The owner drains the channel into its sliding window
//! every time [`PerformanceTracker::efficiency`] is asked for.
//!
//! Scoring, per sample of `n` tasks completed in `elapsed`:
//!
//! - sequential samples update the per-task baseline (`elapsed / n`) and
//!   score the gain parallel execution *could* bring for that workload shape,
//!   `1 - 1/min(n, max_parallel)`;
//! - parallel samples score the realized gain, `1 - 1/speedup` where
//!   `speedup = baseline * n / elapsed`, clamped to `[0, 1]`. Without a
//!   baseline (or with zero elapsed time) they fall back to the potential
//!   score.
//!
//! The efficiency is the recency-weighted mean of the window's scores.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::StrategyKind;

#[derive(Debug, Clone, Copy)]
struct Observation {
    strategy: StrategyKind,
    tasks_completed: usize,
    elapsed: Duration,
}

/// A scored observation kept in the sliding window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSample {
    pub strategy: StrategyKind,
    pub tasks_completed: usize,
    pub elapsed: Duration,
    pub efficiency: f64,
}

/// Cloneable reporting side of a [`PerformanceTracker`].
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    tx: mpsc::UnboundedSender<Observation>,
}

impl TrackerHandle {
    /// Record that `tasks_completed` tasks finished in `elapsed` under
    /// `strategy`.
    pub fn observe(&self, strategy: StrategyKind, tasks_completed: usize, elapsed: Duration) {
        let obs = Observation {
            strategy,
            tasks_completed,
            elapsed,
        };
        if self.tx.send(obs).is_err() {
            warn!(?strategy, tasks_completed, "performance tracker gone; observation discarded");
        }
    }
}

#[derive(Debug)]
pub struct PerformanceTracker {
    handle: TrackerHandle,
    rx: mpsc::UnboundedReceiver<Observation>,
    window: VecDeque<PerformanceSample>,
    window_size: usize,
    max_parallel: usize,
    baseline_tasks: usize,
    baseline_time: Duration,
}

impl PerformanceTracker {
    pub fn new(max_parallel: usize, window_size: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handle: TrackerHandle { tx },
            rx,
            window: VecDeque::with_capacity(window_size.max(1)),
            window_size: window_size.max(1),
            max_parallel: max_parallel.max(1),
            baseline_tasks: 0,
            baseline_time: Duration::ZERO,
        }
    }

    pub fn handle(&self) -> TrackerHandle {
        self.handle.clone()
    }

    /// Shorthand for `self.handle().observe(..)`.
    pub fn observe(&self, strategy: StrategyKind, tasks_completed: usize, elapsed: Duration) {
        self.handle.observe(strategy, tasks_completed, elapsed);
    }

    /// Smoothed efficiency in `[0, 1]`; 0.0 before anything was observed.
    pub fn efficiency(&mut self) -> f64 {
        self.drain();

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for (i, sample) in self.window.iter().enumerate() {
            let weight = (i + 1) as f64;
            weighted += sample.efficiency * weight;
            total_weight += weight;
        }

        if total_weight == 0.0 {
            0.0
        } else {
            (weighted / total_weight).clamp(0.0, 1.0)
        }
    }

    /// Samples currently in the window, oldest first.
    pub fn samples(&mut self) -> Vec<PerformanceSample> {
        self.drain();
        self.window.iter().copied().collect()
    }

    /// Per-task time measured while running sequentially, if any.
    pub fn baseline_per_task(&self) -> Option<Duration> {
        if self.baseline_tasks == 0 {
            None
        } else {
            let nanos = self.baseline_time.as_nanos() / self.baseline_tasks as u128;
            Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
        }
    }

    fn drain(&mut self) {
        while let Ok(obs) = self.rx.try_recv() {
            self.record(obs);
        }
    }

    fn record(&mut self, obs: Observation) {
        if obs.tasks_completed == 0 {
            return;
        }

        let efficiency = match obs.strategy {
            StrategyKind::Sequential => {
                self.baseline_tasks += obs.tasks_completed;
                self.baseline_time = self.baseline_time.saturating_add(obs.elapsed);
                self.potential(obs.tasks_completed)
            }
            StrategyKind::Parallel | StrategyKind::Adaptive => self.realized(&obs),
        };

        debug!(
            strategy = %obs.strategy,
            tasks = obs.tasks_completed,
            elapsed_ms = obs.elapsed.as_millis() as u64,
            efficiency,
            "performance sample recorded"
        );

        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(PerformanceSample {
            strategy: obs.strategy,
            tasks_completed: obs.tasks_completed,
            elapsed: obs.elapsed,
            efficiency,
        });
    }

    fn potential(&self, tasks: usize) -> f64 {
        let width = tasks.min(self.max_parallel) as f64;
        1.0 - 1.0 / width
    }

    fn realized(&self, obs: &Observation) -> f64 {
        let Some(baseline) = self.baseline_per_task() else {
            return self.potential(obs.tasks_completed);
        };
        if obs.elapsed.is_zero() || baseline.is_zero() {
            return self.potential(obs.tasks_completed);
        }

        let sequential_estimate = baseline.as_secs_f64() * obs.tasks_completed as f64;
        let speedup = sequential_estimate / obs.elapsed.as_secs_f64();
        (1.0 - 1.0 / speedup).clamp(0.0, 1.0)
    }
}
