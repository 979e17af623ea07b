// src/engine/timeline.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Kind of a [`TimelineEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventKind {
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    TaskSkipped,
    GoalChecked,
    StrategySwitched,
}

/// One entry of the run's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: TimelineEventKind,
    /// Task id for task events, strategy name for switches, goal (or plan
    /// id) for goal checks.
    pub subject: String,
    pub content: String,
}

/// Append-only event log for a single plan run.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        kind: TimelineEventKind,
        subject: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.push_at(Utc::now(), kind, subject, content);
    }

    pub fn push_at(
        &mut self,
        timestamp: DateTime<Utc>,
        kind: TimelineEventKind,
        subject: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.events.push(TimelineEvent {
            timestamp,
            kind,
            subject: subject.into(),
            content: content.into(),
        });
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Seal the log.
    pub fn into_events(self) -> Vec<TimelineEvent> {
        self.events
    }
}
