//! Interval ingest and validation
//!
//! This module owns the time-windowed interval buffer. Implausible values and
//! artifact-like jumps are dropped silently: the engine prefers a best-effort
//! signal over hard validation failures, so rejection only shows up as a
//! smaller sample count.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::EngineConfig;
use crate::types::BeatInterval;

/// Why an interval was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Outside the plausible 30-200 bpm range
    OutOfRange,
    /// Jumped too far from the previous accepted interval (ectopic beat or missed detection)
    ArtifactJump,
}

/// Result of offering an interval to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    Accepted,
    Rejected(RejectReason),
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestOutcome::Accepted)
    }
}

/// Single-writer, time-windowed buffer of accepted intervals
#[derive(Debug, Clone)]
pub struct IntervalBuffer {
    intervals: VecDeque<BeatInterval>,
    window: Duration,
    max_jump_ratio: f64,
    min_interval_ms: f64,
    max_interval_ms: f64,
    accepted_total: u64,
    rejected_total: u64,
}

impl Default for IntervalBuffer {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl IntervalBuffer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            intervals: VecDeque::new(),
            window: Duration::milliseconds((config.window_secs * 1000.0).round() as i64),
            max_jump_ratio: config.max_jump_ratio,
            min_interval_ms: config.min_interval_ms,
            max_interval_ms: config.max_interval_ms,
            accepted_total: 0,
            rejected_total: 0,
        }
    }

    /// Offer an interval. Never fails; rejected intervals are simply not stored.
    ///
    /// An accepted interval also prunes the buffer against its own timestamp,
    /// so the buffer stays bounded when no snapshot is ever taken.
    pub fn add(&mut self, interval: BeatInterval) -> IngestOutcome {
        let outcome = self.check(&interval);
        match outcome {
            IngestOutcome::Accepted => {
                self.intervals.push_back(interval);
                self.accepted_total += 1;
                self.prune(interval.timestamp);
            }
            IngestOutcome::Rejected(reason) => {
                self.rejected_total += 1;
                tracing::debug!(
                    duration_ms = interval.duration_ms,
                    ?reason,
                    "dropped beat interval"
                );
            }
        }
        outcome
    }

    fn check(&self, interval: &BeatInterval) -> IngestOutcome {
        let duration = interval.duration_ms;
        let in_range = duration >= self.min_interval_ms && duration <= self.max_interval_ms;
        if !duration.is_finite() || !in_range {
            return IngestOutcome::Rejected(RejectReason::OutOfRange);
        }

        if let Some(previous) = self.intervals.back() {
            let jump = (duration - previous.duration_ms).abs() / previous.duration_ms;
            if jump > self.max_jump_ratio {
                return IngestOutcome::Rejected(RejectReason::ArtifactJump);
            }
        }

        IngestOutcome::Accepted
    }

    /// Drop intervals older than the window, measured back from `now`
    pub fn prune(&mut self, now: DateTime<Utc>) {
        // A cutoff before the earliest representable instant keeps everything
        let Some(cutoff) = now.checked_sub_signed(self.window) else {
            return;
        };
        while let Some(front) = self.intervals.front() {
            if front.timestamp < cutoff {
                self.intervals.pop_front();
            } else {
                break;
            }
        }
    }

    /// Empty the buffer (session reset)
    pub fn clear(&mut self) {
        self.intervals.clear();
    }

    /// Owned copy of the buffered intervals; later appends do not affect it
    pub fn snapshot(&self) -> Vec<BeatInterval> {
        self.intervals.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Window length in seconds
    pub fn window_secs(&self) -> f64 {
        self.window.num_milliseconds() as f64 / 1000.0
    }

    pub fn accepted_total(&self) -> u64 {
        self.accepted_total
    }

    pub fn rejected_total(&self) -> u64 {
        self.rejected_total
    }
}
