//! Report encoding
//!
//! This module encodes stress readings into self-describing JSON reports
//! for hosts and the CLI. Every report carries producer metadata so that
//! downstream consumers can attribute it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::baseline::BaselineState;
use crate::error::StressError;
use crate::pipeline::StressReading;
use crate::types::{MetricsSnapshot, StressResult};
use crate::{ENGINE_VERSION, PRODUCER_NAME};

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Baseline section of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportBaseline {
    pub state: BaselineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rmssd_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdnn_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_hr_bpm: Option<f64>,
    pub sample_count: usize,
    /// RMSSD deviation in percent, positive when below baseline
    pub rmssd_deviation_pct: f64,
}

/// One encoded stress reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub metrics: MetricsSnapshot,
    pub stress: StressResult,
    pub baseline: ReportBaseline,
}

/// Encoder for producing stress reports
pub struct StressEncoder {
    instance_id: String,
}

impl Default for StressEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StressEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode a reading into a report
    pub fn encode(&self, reading: &StressReading) -> StressReport {
        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: ENGINE_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        let baseline = ReportBaseline {
            state: reading.baseline_state,
            rmssd_ms: reading.baseline.map(|b| b.rmssd),
            sdnn_ms: reading.baseline.map(|b| b.sdnn),
            mean_hr_bpm: reading.baseline.map(|b| b.mean_hr),
            sample_count: reading.baseline.map(|b| b.sample_count).unwrap_or(0),
            rmssd_deviation_pct: reading.deviation_percent,
        };

        StressReport {
            report_version: REPORT_VERSION.to_string(),
            producer,
            computed_at_utc: format_timestamp(reading.metrics.timestamp),
            metrics: reading.metrics.clone(),
            stress: reading.stress.clone(),
            baseline,
        }
    }

    /// Encode to a compact JSON string
    pub fn encode_to_json(&self, reading: &StressReading) -> Result<String, StressError> {
        let report = self.encode(reading);
        serde_json::to_string(&report).map_err(StressError::JsonError)
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json_pretty(&self, reading: &StressReading) -> Result<String, StressError> {
        let report = self.encode(reading);
        serde_json::to_string_pretty(&report).map_err(StressError::JsonError)
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataQuality, PersonalBaseline, StressFeature, StressLevel};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn make_test_reading(baseline: Option<PersonalBaseline>) -> StressReading {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let metrics = MetricsSnapshot {
            rmssd: 32.0,
            sdnn: 44.0,
            pnn50: 8.0,
            stress_index: 210.0,
            mean_heart_rate: 74.0,
            sample_count: 62,
            lf_power: 640.0,
            hf_power: 320.0,
            lf_hf_ratio: 2.0,
            window_duration: 60.0,
            timestamp,
            quality: DataQuality::Sufficient,
        };

        let mut subscores = BTreeMap::new();
        subscores.insert(StressFeature::Rmssd, 46.6);
        subscores.insert(StressFeature::LfHfRatio, 37.0);

        StressReading {
            metrics,
            stress: StressResult {
                composite_score: 41,
                subscores,
                confidence: 0.88,
                level: Some(StressLevel::Elevated),
            },
            baseline_state: if baseline.is_some() {
                BaselineState::Established
            } else {
                BaselineState::Learning
            },
            baseline,
            deviation_percent: 20.0,
        }
    }

    #[test]
    fn test_encode_report() {
        let baseline = PersonalBaseline {
            rmssd: 40.0,
            sdnn: 50.0,
            mean_hr: 70.0,
            sample_count: 12,
        };
        let encoder = StressEncoder::with_instance_id("test-instance".to_string());
        let report = encoder.encode(&make_test_reading(Some(baseline)));

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.version, ENGINE_VERSION);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.computed_at_utc, "2024-01-15T10:00:00+00:00");

        assert_eq!(report.stress.composite_score, 41);
        assert_eq!(report.baseline.state, BaselineState::Established);
        assert_eq!(report.baseline.rmssd_ms, Some(40.0));
        assert_eq!(report.baseline.sample_count, 12);
        assert_eq!(report.baseline.rmssd_deviation_pct, 20.0);
    }

    #[test]
    fn test_encode_without_baseline() {
        let encoder = StressEncoder::new();
        let report = encoder.encode(&make_test_reading(None));
        assert_eq!(report.baseline.state, BaselineState::Learning);
        assert_eq!(report.baseline.rmssd_ms, None);
        assert_eq!(report.baseline.sample_count, 0);
    }

    #[test]
    fn test_encode_to_json() {
        let encoder = StressEncoder::new();
        let json = encoder.encode_to_json(&make_test_reading(None)).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed.get("report_version").is_some());
        assert!(parsed.get("producer").is_some());
        assert_eq!(parsed["stress"]["level"], "elevated");
        assert_eq!(parsed["baseline"]["state"], "learning");
        assert!(parsed["baseline"].get("rmssd_ms").is_none());
        assert_eq!(parsed["metrics"]["quality"], "sufficient");
    }
}
