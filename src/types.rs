//! Core types for the Synheart Stress engine
//!
//! This module defines the values that flow through the engine: validated beat
//! intervals in, immutable metric snapshots and stress results out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StressError;
use crate::spectral::FrequencyDomainMetrics;
use crate::time_domain::TimeDomainMetrics;

/// Shortest physiologically plausible beat interval (200 bpm)
pub const MIN_INTERVAL_MS: f64 = 300.0;

/// Longest physiologically plausible beat interval (30 bpm)
pub const MAX_INTERVAL_MS: f64 = 2000.0;

/// Minimum buffered intervals for a snapshot to be eligible for classification
pub const MIN_SAMPLES_FOR_SNAPSHOT: usize = 10;

/// A single beat-to-beat (RR) interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatInterval {
    /// When the beat closing this interval was detected (UTC)
    pub timestamp: DateTime<Utc>,
    /// Interval length in milliseconds
    pub duration_ms: f64,
}

impl BeatInterval {
    pub fn new(timestamp: DateTime<Utc>, duration_ms: f64) -> Self {
        Self {
            timestamp,
            duration_ms,
        }
    }

    /// Whether the duration falls inside the 30-200 bpm range
    pub fn is_plausible(&self) -> bool {
        self.duration_ms.is_finite()
            && (MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&self.duration_ms)
    }

    /// Strictly parse an interval from external JSON.
    ///
    /// Only structural problems are errors here; plausibility is left to ingest.
    pub fn from_json(json: &str) -> Result<Self, StressError> {
        let interval: Self = serde_json::from_str(json)?;
        if !(interval.duration_ms.is_finite() && interval.duration_ms > 0.0) {
            return Err(StressError::InvalidInterval(format!(
                "duration_ms must be a positive number, got {}",
                interval.duration_ms
            )));
        }
        Ok(interval)
    }

    /// Instantaneous heart rate implied by this interval (bpm)
    pub fn heart_rate_bpm(&self) -> f64 {
        if self.duration_ms > 0.0 {
            60_000.0 / self.duration_ms
        } else {
            0.0
        }
    }
}

/// Whether a snapshot carries enough data to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Sufficient,
    Insufficient,
}

/// Immutable HRV metrics computed from one buffer snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Root mean square of successive differences (ms)
    pub rmssd: f64,
    /// Sample standard deviation of intervals (ms)
    pub sdnn: f64,
    /// Share of successive differences above 50 ms (percent, 0-100)
    pub pnn50: f64,
    /// Baevsky stress index
    pub stress_index: f64,
    /// Mean heart rate (bpm, rounded)
    pub mean_heart_rate: f64,
    /// Number of intervals the metrics were computed from
    pub sample_count: usize,
    /// Low-frequency band power, 0.04-0.15 Hz (ms²)
    pub lf_power: f64,
    /// High-frequency band power, 0.15-0.4 Hz (ms²)
    pub hf_power: f64,
    /// LF/HF power ratio (0 when HF power is zero)
    pub lf_hf_ratio: f64,
    /// Length of the analysis window (seconds)
    pub window_duration: f64,
    /// When the snapshot was computed
    pub timestamp: DateTime<Utc>,
    /// Sufficiency flag
    pub quality: DataQuality,
}

impl MetricsSnapshot {
    /// Placeholder snapshot for a buffer too short to interpret
    pub fn insufficient(
        sample_count: usize,
        window_duration: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            rmssd: 0.0,
            sdnn: 0.0,
            pnn50: 0.0,
            stress_index: 0.0,
            mean_heart_rate: 0.0,
            sample_count,
            lf_power: 0.0,
            hf_power: 0.0,
            lf_hf_ratio: 0.0,
            window_duration,
            timestamp,
            quality: DataQuality::Insufficient,
        }
    }

    /// Build a snapshot from time-domain metrics. Spectral fields start at zero
    /// and are filled in with [`MetricsSnapshot::with_spectral`].
    pub fn from_time_domain(
        metrics: &TimeDomainMetrics,
        window_duration: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        if metrics.sample_count < MIN_SAMPLES_FOR_SNAPSHOT {
            return Self::insufficient(metrics.sample_count, window_duration, timestamp);
        }

        Self {
            rmssd: metrics.rmssd,
            sdnn: metrics.sdnn,
            pnn50: metrics.pnn50,
            stress_index: metrics.stress_index,
            mean_heart_rate: metrics.mean_heart_rate,
            sample_count: metrics.sample_count,
            lf_power: 0.0,
            hf_power: 0.0,
            lf_hf_ratio: 0.0,
            window_duration,
            timestamp,
            quality: DataQuality::Sufficient,
        }
    }

    /// Return a copy with the spectral fields replaced.
    /// Insufficient snapshots are returned unchanged.
    pub fn with_spectral(&self, spectral: &FrequencyDomainMetrics) -> Self {
        if !self.is_sufficient() {
            return self.clone();
        }
        Self {
            lf_power: spectral.lf_power,
            hf_power: spectral.hf_power,
            lf_hf_ratio: spectral.lf_hf_ratio,
            ..self.clone()
        }
    }

    pub fn is_sufficient(&self) -> bool {
        self.quality == DataQuality::Sufficient
    }

    /// Load a snapshot from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the snapshot to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Population norms used until a personal baseline is established
pub const DEFAULT_BASELINE_RMSSD_MS: f64 = 42.0;
pub const DEFAULT_BASELINE_SDNN_MS: f64 = 50.0;
pub const DEFAULT_RESTING_HR_BPM: f64 = 72.0;

/// Rolling personal averages of the baseline-relative features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonalBaseline {
    /// Average RMSSD (ms)
    pub rmssd: f64,
    /// Average SDNN (ms)
    pub sdnn: f64,
    /// Average heart rate (bpm)
    pub mean_hr: f64,
    /// Number of measurements in the rolling store
    pub sample_count: usize,
}

impl PersonalBaseline {
    /// Population defaults, used when no personal baseline exists yet
    pub fn population_default() -> Self {
        Self {
            rmssd: DEFAULT_BASELINE_RMSSD_MS,
            sdnn: DEFAULT_BASELINE_SDNN_MS,
            mean_hr: DEFAULT_RESTING_HR_BPM,
            sample_count: 0,
        }
    }
}

impl Default for PersonalBaseline {
    fn default() -> Self {
        Self::population_default()
    }
}

/// Features contributing to the composite stress score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressFeature {
    Rmssd,
    Sdnn,
    Pnn50,
    StressIndex,
    LfHfRatio,
    HfPower,
    MeanHeartRate,
}

impl StressFeature {
    pub const ALL: [StressFeature; 7] = [
        StressFeature::Rmssd,
        StressFeature::Sdnn,
        StressFeature::Pnn50,
        StressFeature::StressIndex,
        StressFeature::LfHfRatio,
        StressFeature::HfPower,
        StressFeature::MeanHeartRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StressFeature::Rmssd => "rmssd",
            StressFeature::Sdnn => "sdnn",
            StressFeature::Pnn50 => "pnn50",
            StressFeature::StressIndex => "stress_index",
            StressFeature::LfHfRatio => "lf_hf_ratio",
            StressFeature::HfPower => "hf_power",
            StressFeature::MeanHeartRate => "mean_heart_rate",
        }
    }

    /// Raw feature value as carried by a snapshot
    pub fn value_in(&self, snapshot: &MetricsSnapshot) -> f64 {
        match self {
            StressFeature::Rmssd => snapshot.rmssd,
            StressFeature::Sdnn => snapshot.sdnn,
            StressFeature::Pnn50 => snapshot.pnn50,
            StressFeature::StressIndex => snapshot.stress_index,
            StressFeature::LfHfRatio => snapshot.lf_hf_ratio,
            StressFeature::HfPower => snapshot.hf_power,
            StressFeature::MeanHeartRate => snapshot.mean_heart_rate,
        }
    }
}

/// Coarse stress band derived from the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressLevel {
    Relaxed,
    Normal,
    Elevated,
    High,
}

impl StressLevel {
    /// Bands follow the zone boundaries of the piecewise scoring (12/37/62)
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=12 => StressLevel::Relaxed,
            13..=37 => StressLevel::Normal,
            38..=62 => StressLevel::Elevated,
            _ => StressLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StressLevel::Relaxed => "relaxed",
            StressLevel::Normal => "normal",
            StressLevel::Elevated => "elevated",
            StressLevel::High => "high",
        }
    }
}

/// Outcome of one classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressResult {
    /// Weighted composite score (0-100)
    pub composite_score: u8,
    /// Per-feature stress subscores (0-100)
    pub subscores: BTreeMap<StressFeature, f64>,
    /// Confidence in the composite (0-1)
    pub confidence: f64,
    /// Stress band, absent when there was not enough data
    pub level: Option<StressLevel>,
}

impl StressResult {
    /// The definitional floor for snapshots without enough data
    pub fn insufficient() -> Self {
        Self {
            composite_score: 0,
            subscores: BTreeMap::new(),
            confidence: 0.0,
            level: None,
        }
    }

    pub fn subscore(&self, feature: StressFeature) -> Option<f64> {
        self.subscores.get(&feature).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_interval_plausibility() {
        assert!(BeatInterval::new(ts(), 300.0).is_plausible());
        assert!(BeatInterval::new(ts(), 2000.0).is_plausible());
        assert!(!BeatInterval::new(ts(), 299.9).is_plausible());
        assert!(!BeatInterval::new(ts(), 2000.1).is_plausible());
        assert!(!BeatInterval::new(ts(), f64::NAN).is_plausible());
        assert!((BeatInterval::new(ts(), 800.0).heart_rate_bpm() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_interval_strict_parse() {
        let interval =
            BeatInterval::from_json(r#"{"timestamp":"2024-01-15T09:30:00Z","duration_ms":812.0}"#)
                .unwrap();
        assert_eq!(interval, BeatInterval::new(ts(), 812.0));

        // Implausible but well-formed values are left for ingest to drop
        let slow = r#"{"timestamp":"2024-01-15T09:30:00Z","duration_ms":150}"#;
        assert!(BeatInterval::from_json(slow).is_ok());

        assert!(matches!(
            BeatInterval::from_json(r#"{"timestamp":"2024-01-15T09:30:00Z","duration_ms":-5}"#),
            Err(StressError::InvalidInterval(_))
        ));
        assert!(matches!(
            BeatInterval::from_json(r#"{"duration_ms":800}"#),
            Err(StressError::JsonError(_))
        ));
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let snapshot = MetricsSnapshot {
            rmssd: 41.25,
            sdnn: 52.5,
            pnn50: 18.75,
            stress_index: 123.4,
            mean_heart_rate: 71.0,
            sample_count: 64,
            lf_power: 812.5,
            hf_power: 301.0,
            lf_hf_ratio: 2.699,
            window_duration: 60.0,
            timestamp: ts(),
            quality: DataQuality::Sufficient,
        };

        let json = snapshot.to_json().unwrap();
        let loaded = MetricsSnapshot::from_json(&json).unwrap();
        assert_eq!(snapshot, loaded);
    }

    #[test]
    fn test_snapshot_round_trip_keeps_every_bit() {
        // Values without a short decimal form, where a lossy parser is off by one ulp
        let mut seed: u64 = 0x5eed_1234_abcd_0001;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 11) as f64 / (1u64 << 53) as f64
        };

        for _ in 0..2000 {
            let snapshot = MetricsSnapshot {
                rmssd: next() * 150.0,
                sdnn: next() * 150.0,
                pnn50: next() * 100.0,
                stress_index: next() * 900.0,
                mean_heart_rate: 40.0 + next() * 140.0,
                sample_count: 64,
                lf_power: next() * 5000.0,
                hf_power: next() * 5000.0,
                lf_hf_ratio: next() * 12.0,
                window_duration: 60.0,
                timestamp: ts(),
                quality: DataQuality::Sufficient,
            };
            let loaded = MetricsSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
            assert_eq!(snapshot, loaded);
        }
    }

    #[test]
    fn test_with_spectral_copies() {
        let td = TimeDomainMetrics {
            rmssd: 30.0,
            sdnn: 40.0,
            pnn50: 5.0,
            stress_index: 200.0,
            mean_heart_rate: 70.0,
            sample_count: 30,
        };
        let base = MetricsSnapshot::from_time_domain(&td, 60.0, ts());
        let spectral = FrequencyDomainMetrics {
            lf_power: 500.0,
            hf_power: 250.0,
            lf_hf_ratio: 2.0,
        };
        let merged = base.with_spectral(&spectral);

        assert_eq!(base.lf_power, 0.0);
        assert_eq!(merged.lf_power, 500.0);
        assert_eq!(merged.lf_hf_ratio, 2.0);
        assert_eq!(merged.rmssd, base.rmssd);
    }

    #[test]
    fn test_short_buffer_is_insufficient() {
        let td = TimeDomainMetrics {
            rmssd: 30.0,
            sdnn: 40.0,
            pnn50: 5.0,
            stress_index: 200.0,
            mean_heart_rate: 70.0,
            sample_count: 9,
        };
        let snapshot = MetricsSnapshot::from_time_domain(&td, 60.0, ts());
        assert!(!snapshot.is_sufficient());
        assert_eq!(snapshot.rmssd, 0.0);
        assert_eq!(snapshot.sample_count, 9);
    }

    #[test]
    fn test_stress_level_bands() {
        assert_eq!(StressLevel::from_score(0), StressLevel::Relaxed);
        assert_eq!(StressLevel::from_score(12), StressLevel::Relaxed);
        assert_eq!(StressLevel::from_score(13), StressLevel::Normal);
        assert_eq!(StressLevel::from_score(37), StressLevel::Normal);
        assert_eq!(StressLevel::from_score(62), StressLevel::Elevated);
        assert_eq!(StressLevel::from_score(63), StressLevel::High);
        assert_eq!(StressLevel::from_score(100), StressLevel::High);
    }

    #[test]
    fn test_result_subscores_serialize_by_name() {
        let mut result = StressResult::insufficient();
        result.subscores.insert(StressFeature::LfHfRatio, 40.0);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["subscores"]["lf_hf_ratio"], 40.0);
    }
}
