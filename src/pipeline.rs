//! Pipeline orchestration
//!
//! This module provides the public API for one monitoring session. It wires
//! the stages together:
//!
//! 1. IntervalBuffer - Validate and window incoming beat intervals
//! 2. compute_time_domain / compute_frequency_domain - Estimate HRV metrics
//!    from an isolated copy of the buffer
//! 3. BaselineLearner - Track the personal baseline
//! 4. StressClassifier - Score the snapshot against clinical thresholds

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::baseline::{BaselineLearner, BaselineRepository, BaselineState, BASELINE_STORAGE_KEY};
use crate::classifier::StressClassifier;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::StressError;
use crate::ingest::{IngestOutcome, IntervalBuffer};
use crate::spectral::compute_frequency_domain;
use crate::time_domain::compute_time_domain;
use crate::types::{BeatInterval, MetricsSnapshot, PersonalBaseline, StressResult};

/// Snapshot and classification produced by one periodic recomputation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressReading {
    pub metrics: MetricsSnapshot,
    pub stress: StressResult,
    pub baseline_state: BaselineState,
    /// Personal baseline the reading was scored against, present once established
    pub baseline: Option<PersonalBaseline>,
    pub deviation_percent: f64,
}

/// Compute a metrics snapshot from a plain interval sequence.
///
/// Stateless counterpart of [`StressProcessor::compute_snapshot`].
pub fn snapshot_from_intervals(
    intervals: &[BeatInterval],
    window_duration: f64,
    timestamp: DateTime<Utc>,
) -> MetricsSnapshot {
    let durations: Vec<f64> = intervals.iter().map(|i| i.duration_ms).collect();
    let time_domain = compute_time_domain(&durations);
    let snapshot = MetricsSnapshot::from_time_domain(&time_domain, window_duration, timestamp);
    if !snapshot.is_sufficient() {
        return snapshot;
    }
    snapshot.with_spectral(&compute_frequency_domain(&durations))
}

fn period(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0).round() as i64)
}

/// Stateful processor for one user session.
///
/// Single-writer: concurrent interval producers must be serialized by the host.
pub struct StressProcessor {
    config: EngineConfig,
    clock: Box<dyn Clock>,
    buffer: IntervalBuffer,
    baseline: BaselineLearner,
    classifier: StressClassifier,
    last_tick: Option<DateTime<Utc>>,
    last_record: Option<DateTime<Utc>>,
}

impl Default for StressProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl StressProcessor {
    /// Create a new processor with default settings and the system clock
    pub fn new() -> Self {
        Self::build(EngineConfig::default(), Box::new(SystemClock))
    }

    /// Create a processor with a validated configuration and an injected clock
    pub fn with_config(
        config: EngineConfig,
        clock: Box<dyn Clock>,
    ) -> Result<Self, StressError> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    /// Create a processor with a specific buffer window
    pub fn with_window(window_secs: f64) -> Result<Self, StressError> {
        Self::with_config(EngineConfig::with_window_secs(window_secs), Box::new(SystemClock))
    }

    fn build(config: EngineConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            buffer: IntervalBuffer::new(&config),
            baseline: BaselineLearner::new(&config),
            classifier: StressClassifier::new(),
            config,
            clock,
            last_tick: None,
            last_record: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Offer a beat interval to the buffer. Rejections are not errors.
    pub fn ingest(&mut self, interval: BeatInterval) -> IngestOutcome {
        self.buffer.add(interval)
    }

    /// Prune the buffer and compute metrics from an isolated copy of it
    pub fn compute_snapshot(&mut self) -> MetricsSnapshot {
        let now = self.clock.now();
        self.buffer.prune(now);
        let intervals = self.buffer.snapshot();
        snapshot_from_intervals(&intervals, self.buffer.window_secs(), now)
    }

    /// Feed a snapshot into the personal baseline
    pub fn record_baseline_measurement(&mut self, snapshot: &MetricsSnapshot) {
        self.baseline.record_measurement(snapshot);
    }

    /// Classify a snapshot, using the personal baseline once it is established
    pub fn classify(&self, snapshot: &MetricsSnapshot) -> StressResult {
        let baseline = self.baseline.baseline();
        self.classify_with(snapshot, baseline.as_ref())
    }

    /// Classify a snapshot against an explicit baseline
    pub fn classify_with(
        &self,
        snapshot: &MetricsSnapshot,
        baseline: Option<&PersonalBaseline>,
    ) -> StressResult {
        self.classifier.evaluate(snapshot, baseline)
    }

    /// RMSSD deviation from the personal (or population) baseline, in percent
    pub fn deviation_percent(&self, snapshot: &MetricsSnapshot) -> f64 {
        self.baseline.deviation_percent(snapshot)
    }

    /// Periodic recomputation.
    ///
    /// Returns `None` until the tick interval has elapsed since the previous
    /// reading; otherwise produces a fresh [`StressReading`].
    pub fn tick(&mut self) -> Option<StressReading> {
        let now = self.clock.now();
        if let Some(last) = self.last_tick {
            if now - last < period(self.config.tick_secs) {
                return None;
            }
        }
        self.last_tick = Some(now);
        Some(self.reading())
    }

    /// Compute and classify a snapshot right now.
    ///
    /// The snapshot is scored against the baseline as it stood before this
    /// reading. It is then recorded into the baseline if at least
    /// `baseline_record_secs` have passed since the last recorded reading.
    pub fn reading(&mut self) -> StressReading {
        let metrics = self.compute_snapshot();
        let stress = self.classify(&metrics);
        let reading = StressReading {
            deviation_percent: self.deviation_percent(&metrics),
            baseline_state: self.baseline.state(),
            baseline: self.baseline.baseline(),
            metrics,
            stress,
        };

        if reading.metrics.is_sufficient() && self.record_due(reading.metrics.timestamp) {
            self.record_baseline_measurement(&reading.metrics);
            self.last_record = Some(reading.metrics.timestamp);
        }
        reading
    }

    fn record_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_record {
            Some(last) => now - last >= period(self.config.baseline_record_secs),
            None => true,
        }
    }

    pub fn baseline_state(&self) -> BaselineState {
        self.baseline.state()
    }

    pub fn personal_baseline(&self) -> Option<PersonalBaseline> {
        self.baseline.baseline()
    }

    /// Measurements currently held by the baseline learner
    pub fn baseline_samples(&self) -> usize {
        self.baseline.sample_count()
    }

    pub fn buffered_intervals(&self) -> usize {
        self.buffer.len()
    }

    pub fn rejected_intervals(&self) -> u64 {
        self.buffer.rejected_total()
    }

    /// Start a new session: drop buffered intervals, keep the baseline
    pub fn reset_session(&mut self) {
        self.buffer.clear();
        self.last_tick = None;
        tracing::info!("session reset");
    }

    /// Forget the personal baseline
    pub fn reset_baseline(&mut self) {
        self.baseline.reset();
        self.last_record = None;
    }

    /// Load a persisted sample store under this processor's configuration
    pub fn load_baseline(&mut self, json: &str) -> Result<(), StressError> {
        self.baseline = BaselineLearner::from_json(json, &self.config)?;
        Ok(())
    }

    /// Save baseline state to JSON
    pub fn save_baseline(&self) -> Result<String, StressError> {
        Ok(self.baseline.to_json()?)
    }

    /// Write the baseline to a repository
    pub fn persist_baseline(
        &self,
        repository: &mut dyn BaselineRepository,
    ) -> Result<(), StressError> {
        let json = self.save_baseline()?;
        repository.store(BASELINE_STORAGE_KEY, &json).map_err(|e| {
            tracing::warn!(error = %e, "failed to persist baseline");
            e
        })
    }

    /// Restore the baseline from a repository. Returns whether one was found.
    pub fn restore_baseline(
        &mut self,
        repository: &dyn BaselineRepository,
    ) -> Result<bool, StressError> {
        match repository.load(BASELINE_STORAGE_KEY)? {
            Some(json) => {
                self.load_baseline(&json)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
