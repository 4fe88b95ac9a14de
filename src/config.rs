//! Engine configuration
//!
//! All tunables of the engine live in one serde struct. Defaults reproduce
//! the published behavior; hosts may load overrides from JSON.

use serde::{Deserialize, Serialize};

use crate::error::StressError;
use crate::types::{MAX_INTERVAL_MS, MIN_INTERVAL_MS};

/// Default analysis window in seconds
pub const DEFAULT_WINDOW_SECS: f64 = 60.0;

/// Default recomputation period in seconds
pub const DEFAULT_TICK_SECS: f64 = 5.0;

/// Default maximum relative jump between consecutive intervals
pub const DEFAULT_MAX_JUMP_RATIO: f64 = 0.20;

/// Default baseline retention in days
pub const DEFAULT_BASELINE_RETENTION_DAYS: i64 = 7;

/// Default maximum number of stored baseline measurements
pub const DEFAULT_BASELINE_CAPACITY: usize = 200;

/// Default number of measurements required before the baseline is used
pub const DEFAULT_BASELINE_MIN_SAMPLES: usize = 5;

/// Default minimum time between baseline measurements (seconds).
///
/// Hourly measurements let the 200-entry store span the 7-day retention.
pub const DEFAULT_BASELINE_RECORD_SECS: f64 = 3600.0;

/// Longest accepted window, tick or record period (seconds)
pub const MAX_PERIOD_SECS: f64 = 86_400.0;

/// Longest accepted baseline retention (days)
pub const MAX_BASELINE_RETENTION_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Interval buffer window (seconds)
    pub window_secs: f64,
    /// Minimum time between periodic recomputations (seconds)
    pub tick_secs: f64,
    /// Largest accepted |Δ| / previous between consecutive intervals
    pub max_jump_ratio: f64,
    /// Shortest accepted interval (ms)
    pub min_interval_ms: f64,
    /// Longest accepted interval (ms)
    pub max_interval_ms: f64,
    /// How long baseline measurements are retained (days)
    pub baseline_retention_days: i64,
    /// Maximum stored baseline measurements
    pub baseline_capacity: usize,
    /// Measurements required before the baseline is established
    pub baseline_min_samples: usize,
    /// Minimum time between readings recorded into the baseline (seconds)
    pub baseline_record_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            tick_secs: DEFAULT_TICK_SECS,
            max_jump_ratio: DEFAULT_MAX_JUMP_RATIO,
            min_interval_ms: MIN_INTERVAL_MS,
            max_interval_ms: MAX_INTERVAL_MS,
            baseline_retention_days: DEFAULT_BASELINE_RETENTION_DAYS,
            baseline_capacity: DEFAULT_BASELINE_CAPACITY,
            baseline_min_samples: DEFAULT_BASELINE_MIN_SAMPLES,
            baseline_record_secs: DEFAULT_BASELINE_RECORD_SECS,
        }
    }
}

impl EngineConfig {
    /// Default configuration with a different buffer window
    pub fn with_window_secs(window_secs: f64) -> Self {
        Self {
            window_secs,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), StressError> {
        if !(self.window_secs > 0.0 && self.window_secs <= MAX_PERIOD_SECS) {
            return Err(StressError::InvalidConfig(format!(
                "window_secs must be in (0, {MAX_PERIOD_SECS}], got {}",
                self.window_secs
            )));
        }
        if !(self.tick_secs >= 0.0 && self.tick_secs <= MAX_PERIOD_SECS) {
            return Err(StressError::InvalidConfig(format!(
                "tick_secs must be in [0, {MAX_PERIOD_SECS}], got {}",
                self.tick_secs
            )));
        }
        if !(self.baseline_record_secs >= 0.0 && self.baseline_record_secs <= MAX_PERIOD_SECS) {
            return Err(StressError::InvalidConfig(format!(
                "baseline_record_secs must be in [0, {MAX_PERIOD_SECS}], got {}",
                self.baseline_record_secs
            )));
        }
        if !(self.max_jump_ratio > 0.0 && self.max_jump_ratio <= 1.0) {
            return Err(StressError::InvalidConfig(format!(
                "max_jump_ratio must be in (0, 1], got {}",
                self.max_jump_ratio
            )));
        }
        if !(self.min_interval_ms > 0.0 && self.min_interval_ms < self.max_interval_ms) {
            return Err(StressError::InvalidConfig(format!(
                "interval range [{}, {}] is empty or non-positive",
                self.min_interval_ms, self.max_interval_ms
            )));
        }
        if !(1..=MAX_BASELINE_RETENTION_DAYS).contains(&self.baseline_retention_days) {
            return Err(StressError::InvalidConfig(format!(
                "baseline_retention_days must be in 1..={MAX_BASELINE_RETENTION_DAYS}, got {}",
                self.baseline_retention_days
            )));
        }
        if self.baseline_capacity == 0 {
            return Err(StressError::InvalidConfig(
                "baseline_capacity must be at least 1".to_string(),
            ));
        }
        if self.baseline_min_samples == 0 || self.baseline_min_samples > self.baseline_capacity {
            return Err(StressError::InvalidConfig(format!(
                "baseline_min_samples must be in 1..={}, got {}",
                self.baseline_capacity, self.baseline_min_samples
            )));
        }
        Ok(())
    }

    /// Load and validate a configuration from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, StressError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
