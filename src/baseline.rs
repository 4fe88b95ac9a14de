//! Personal baseline learning
//!
//! This module keeps a rolling store of recent measurements (RMSSD, SDNN,
//! heart rate) and averages them into a personal baseline once enough
//! measurements exist. Until then callers fall back to population norms.
//!
//! Persistence is left to the host through the [`BaselineRepository`] seam.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;

use crate::config::{EngineConfig, MAX_BASELINE_RETENTION_DAYS};
use crate::error::StressError;
use crate::types::{MetricsSnapshot, PersonalBaseline};

/// Storage key under which the learner is persisted
pub const BASELINE_STORAGE_KEY: &str = "hrv_baseline";

/// Deviation percentages are clamped to this range
pub const DEVIATION_RANGE_PCT: (f64, f64) = (-100.0, 200.0);

/// One stored measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineSample {
    pub rmssd: f64,
    pub sdnn: f64,
    pub hr: f64,
    pub timestamp: DateTime<Utc>,
}

/// Learning progress of the personal baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineState {
    /// No measurements yet
    Cold,
    /// Some measurements, not enough to trust
    Learning,
    /// Enough measurements; the personal baseline is in use
    Established,
}

impl BaselineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaselineState::Cold => "cold",
            BaselineState::Learning => "learning",
            BaselineState::Established => "established",
        }
    }
}

/// Rolling multi-day store of measurements and the baseline derived from it.
///
/// Only the sample store is persisted. Retention, capacity and the promotion
/// threshold always come from the engine configuration, and the averages are
/// recomputed on load.
#[derive(Debug, Clone)]
pub struct BaselineLearner {
    /// Stored measurements, oldest first
    samples: VecDeque<BaselineSample>,
    /// Last computed averages
    baseline: PersonalBaseline,
    /// Retention window in days
    retention_days: i64,
    /// Maximum stored measurements
    capacity: usize,
    /// Measurements required before the baseline is used
    min_samples: usize,
}

/// Persisted form of the learner
#[derive(Debug, Serialize, Deserialize)]
struct SampleStore {
    samples: Vec<BaselineSample>,
}

impl BaselineSample {
    /// Finite, non-negative variability and a positive heart rate
    pub fn is_valid(&self) -> bool {
        let variability_ok = |v: f64| v.is_finite() && v >= 0.0;
        variability_ok(self.rmssd)
            && variability_ok(self.sdnn)
            && self.hr.is_finite()
            && self.hr > 0.0
    }
}

impl Default for BaselineLearner {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl BaselineLearner {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            samples: VecDeque::with_capacity(config.baseline_capacity),
            baseline: PersonalBaseline::population_default(),
            retention_days: config.baseline_retention_days,
            capacity: config.baseline_capacity,
            min_samples: config.baseline_min_samples,
        }
    }

    /// Add a measurement. Insufficient-data snapshots are ignored.
    pub fn record_measurement(&mut self, snapshot: &MetricsSnapshot) {
        if !snapshot.is_sufficient() {
            return;
        }

        let before = self.state();

        self.samples.push_back(BaselineSample {
            rmssd: snapshot.rmssd,
            sdnn: snapshot.sdnn,
            hr: snapshot.mean_heart_rate,
            timestamp: snapshot.timestamp,
        });
        self.prune(snapshot.timestamp);
        self.refresh();

        let after = self.state();
        if before != after {
            tracing::info!(
                from = before.as_str(),
                to = after.as_str(),
                samples = self.samples.len(),
                "baseline state changed"
            );
        }
    }

    /// Drop samples older than the retention window before `latest`, then
    /// the oldest ones beyond capacity
    fn prune(&mut self, latest: DateTime<Utc>) {
        let days = self.retention_days.clamp(0, MAX_BASELINE_RETENTION_DAYS);
        if let Some(cutoff) = latest.checked_sub_signed(Duration::days(days)) {
            self.samples.retain(|s| s.timestamp >= cutoff);
        }
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    fn refresh(&mut self) {
        self.baseline.sample_count = self.samples.len();
        if self.samples.len() >= self.min_samples {
            self.recompute();
        }
    }

    fn recompute(&mut self) {
        let n = self.samples.len() as f64;
        let (rmssd, sdnn, hr) = self.samples.iter().fold((0.0, 0.0, 0.0), |acc, s| {
            (acc.0 + s.rmssd, acc.1 + s.sdnn, acc.2 + s.hr)
        });
        self.baseline = PersonalBaseline {
            rmssd: rmssd / n,
            sdnn: sdnn / n,
            mean_hr: hr / n,
            sample_count: self.samples.len(),
        };
    }

    pub fn state(&self) -> BaselineState {
        match self.samples.len() {
            0 => BaselineState::Cold,
            n if n < self.min_samples => BaselineState::Learning,
            _ => BaselineState::Established,
        }
    }

    /// The personal baseline, available only once established
    pub fn baseline(&self) -> Option<PersonalBaseline> {
        match self.state() {
            BaselineState::Established => Some(self.baseline),
            _ => None,
        }
    }

    /// Personal baseline when established, population defaults otherwise
    pub fn effective_baseline(&self) -> PersonalBaseline {
        self.baseline()
            .unwrap_or_else(PersonalBaseline::population_default)
    }

    /// How far the current RMSSD sits below the baseline, in percent.
    ///
    /// Positive means more stressed than usual. Clamped to [-100, 200];
    /// insufficient snapshots report 0.
    pub fn deviation_percent(&self, current: &MetricsSnapshot) -> f64 {
        if !current.is_sufficient() {
            return 0.0;
        }
        let baseline = self.effective_baseline();
        if baseline.rmssd <= 0.0 {
            return 0.0;
        }
        ((1.0 - current.rmssd / baseline.rmssd) * 100.0)
            .clamp(DEVIATION_RANGE_PCT.0, DEVIATION_RANGE_PCT.1)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> impl Iterator<Item = &BaselineSample> {
        self.samples.iter()
    }

    /// Forget all measurements
    pub fn reset(&mut self) {
        self.samples.clear();
        self.baseline = PersonalBaseline::population_default();
        tracing::info!("baseline reset");
    }

    /// Rebuild a learner from a persisted sample store.
    ///
    /// Samples are validated, sorted, pruned to the retention window of the
    /// newest one and capped before the averages are recomputed.
    pub fn from_json(json: &str, config: &EngineConfig) -> Result<Self, StressError> {
        let store: SampleStore = serde_json::from_str(json)
            .map_err(|e| StressError::ParseError(format!("baseline store: {e}")))?;

        if let Some(index) = store.samples.iter().position(|s| !s.is_valid()) {
            return Err(StressError::ParseError(format!(
                "baseline store: sample {index} has non-finite or out-of-range values"
            )));
        }

        let mut samples = store.samples;
        samples.sort_by_key(|s| s.timestamp);

        let mut learner = Self::new(config);
        let latest = samples.last().map(|s| s.timestamp);
        learner.samples.extend(samples);
        if let Some(latest) = latest {
            learner.prune(latest);
        }
        learner.refresh();
        Ok(learner)
    }

    /// Serialize the sample store to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&SampleStore {
            samples: self.samples.iter().copied().collect(),
        })
    }
}

/// Durable key-value storage for the serialized baseline
pub trait BaselineRepository {
    fn load(&self, key: &str) -> Result<Option<String>, StressError>;
    fn store(&mut self, key: &str, value: &str) -> Result<(), StressError>;
}

/// In-process repository
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    entries: HashMap<String, String>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaselineRepository for MemoryRepository {
    fn load(&self, key: &str) -> Result<Option<String>, StressError> {
        Ok(self.entries.get(key).cloned())
    }

    fn store(&mut self, key: &str, value: &str) -> Result<(), StressError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileRepository {
    dir: PathBuf,
}

impl FileRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl BaselineRepository for FileRepository {
    fn load(&self, key: &str) -> Result<Option<String>, StressError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| StressError::Persistence(format!("{}: {e}", path.display())))
    }

    fn store(&mut self, key: &str, value: &str) -> Result<(), StressError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| StressError::Persistence(format!("{}: {e}", self.dir.display())))?;
        let path = self.path_for(key);
        fs::write(&path, value)
            .map_err(|e| StressError::Persistence(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataQuality;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap()
    }

    fn snapshot(rmssd: f64, sdnn: f64, hr: f64, at: DateTime<Utc>) -> MetricsSnapshot {
        MetricsSnapshot {
            rmssd,
            sdnn,
            pnn50: 10.0,
            stress_index: 150.0,
            mean_heart_rate: hr,
            sample_count: 60,
            lf_power: 0.0,
            hf_power: 0.0,
            lf_hf_ratio: 0.0,
            window_duration: 60.0,
            timestamp: at,
            quality: DataQuality::Sufficient,
        }
    }

    #[test]
    fn test_state_progression() {
        let mut learner = BaselineLearner::default();
        assert_eq!(learner.state(), BaselineState::Cold);
        assert!(learner.baseline().is_none());

        for i in 0..4 {
            learner.record_measurement(&snapshot(50.0, 60.0, 70.0, start() + Duration::hours(i)));
        }
        assert_eq!(learner.state(), BaselineState::Learning);
        assert!(learner.baseline().is_none());

        learner.record_measurement(&snapshot(50.0, 60.0, 70.0, start() + Duration::hours(4)));
        assert_eq!(learner.state(), BaselineState::Established);
        assert!(learner.baseline().is_some());
    }

    #[test]
    fn test_baseline_is_mean_of_samples() {
        let mut learner = BaselineLearner::default();
        for i in 0..5 {
            let rmssd = 40.0 + 5.0 * i as f64; // 40..60
            let at = start() + Duration::hours(i);
            learner.record_measurement(&snapshot(rmssd, 50.0, 70.0 + i as f64, at));
        }
        let baseline = learner.baseline().unwrap();
        assert!((baseline.rmssd - 50.0).abs() < 1e-9);
        assert!((baseline.sdnn - 50.0).abs() < 1e-9);
        assert!((baseline.mean_hr - 72.0).abs() < 1e-9);
        assert_eq!(baseline.sample_count, 5);
    }

    #[test]
    fn test_ignores_insufficient_snapshots() {
        let mut learner = BaselineLearner::default();
        learner.record_measurement(&MetricsSnapshot::insufficient(5, 60.0, start()));
        assert_eq!(learner.sample_count(), 0);
    }

    #[test]
    fn test_prunes_old_samples() {
        let mut learner = BaselineLearner::default();
        for i in 0..5 {
            learner.record_measurement(&snapshot(30.0, 50.0, 70.0, start() + Duration::hours(i)));
        }
        assert_eq!(learner.sample_count(), 5);

        // Eight days later only the new measurement survives
        learner.record_measurement(&snapshot(60.0, 50.0, 70.0, start() + Duration::days(8)));
        assert_eq!(learner.sample_count(), 1);
        assert_eq!(learner.state(), BaselineState::Learning);
    }

    #[test]
    fn test_caps_sample_store() {
        let mut learner = BaselineLearner::default();
        for i in 0..250 {
            learner.record_measurement(&snapshot(
                i as f64,
                50.0,
                70.0,
                start() + Duration::minutes(i),
            ));
        }
        assert_eq!(learner.sample_count(), 200);
        // Oldest dropped first: remaining rmssd values are 50..249
        let baseline = learner.baseline().unwrap();
        assert!((baseline.rmssd - 149.5).abs() < 1e-9);
    }

    #[test]
    fn test_deviation_percent() {
        let mut learner = BaselineLearner::default();

        // Population default RMSSD 42 before the baseline exists
        let current = snapshot(21.0, 50.0, 70.0, start());
        assert!((learner.deviation_percent(&current) - 50.0).abs() < 1e-9);

        for i in 0..5 {
            learner.record_measurement(&snapshot(50.0, 50.0, 70.0, start() + Duration::hours(i)));
        }
        let current = snapshot(25.0, 50.0, 70.0, start() + Duration::hours(6));
        assert!((learner.deviation_percent(&current) - 50.0).abs() < 1e-9);

        let relaxed = snapshot(200.0, 50.0, 70.0, start() + Duration::hours(6));
        assert_eq!(learner.deviation_percent(&relaxed), -100.0);

        let empty = MetricsSnapshot::insufficient(3, 60.0, start());
        assert_eq!(learner.deviation_percent(&empty), 0.0);
    }

    #[test]
    fn test_reset() {
        let mut learner = BaselineLearner::default();
        for i in 0..5 {
            learner.record_measurement(&snapshot(50.0, 50.0, 70.0, start() + Duration::hours(i)));
        }
        learner.reset();
        assert_eq!(learner.state(), BaselineState::Cold);
        assert_eq!(learner.effective_baseline(), PersonalBaseline::population_default());
    }

    #[test]
    fn test_serialization() {
        let mut learner = BaselineLearner::default();
        for i in 0..6 {
            learner.record_measurement(&snapshot(45.0, 55.0, 68.0, start() + Duration::hours(i)));
        }

        let json = learner.to_json().unwrap();
        let loaded = BaselineLearner::from_json(&json, &EngineConfig::default()).unwrap();

        assert_eq!(learner.baseline(), loaded.baseline());
        assert_eq!(loaded.sample_count(), 6);
    }

    fn stored(samples: &[(f64, f64, f64, DateTime<Utc>)]) -> String {
        let samples: Vec<serde_json::Value> = samples
            .iter()
            .map(|(rmssd, sdnn, hr, at)| {
                serde_json::json!({ "rmssd": rmssd, "sdnn": sdnn, "hr": hr, "timestamp": at })
            })
            .collect();
        serde_json::json!({ "samples": samples }).to_string()
    }

    #[test]
    fn test_load_applies_engine_config() {
        let samples: Vec<_> = (0..5)
            .map(|i| (50.0, 60.0, 70.0, start() + Duration::hours(i)))
            .collect();
        let config = EngineConfig {
            baseline_min_samples: 10,
            ..Default::default()
        };

        let learner = BaselineLearner::from_json(&stored(&samples), &config).unwrap();
        assert_eq!(learner.sample_count(), 5);
        assert_eq!(learner.state(), BaselineState::Learning);
        assert!(learner.baseline().is_none());
    }

    #[test]
    fn test_load_recomputes_averages() {
        // Stale cached averages and config fields in the document are ignored
        let json = r#"{
            "samples": [
                {"rmssd": 40.0, "sdnn": 50.0, "hr": 70.0, "timestamp": "2024-01-15T07:00:00Z"},
                {"rmssd": 50.0, "sdnn": 50.0, "hr": 70.0, "timestamp": "2024-01-15T08:00:00Z"},
                {"rmssd": 60.0, "sdnn": 50.0, "hr": 70.0, "timestamp": "2024-01-15T09:00:00Z"}
            ],
            "baseline": {"rmssd": -3.0, "sdnn": 0.0, "mean_hr": 0.0, "sample_count": 999},
            "retention_days": 9223372036854775807,
            "capacity": 1,
            "min_samples": 1
        }"#;
        let config = EngineConfig {
            baseline_min_samples: 3,
            ..Default::default()
        };

        let mut learner = BaselineLearner::from_json(json, &config).unwrap();
        let baseline = learner.baseline().unwrap();
        assert!((baseline.rmssd - 50.0).abs() < 1e-9);
        assert_eq!(baseline.sample_count, 3);

        // Later measurements use the configured retention
        learner.record_measurement(&snapshot(45.0, 50.0, 70.0, start() + Duration::hours(3)));
        assert_eq!(learner.sample_count(), 4);
    }

    #[test]
    fn test_load_prunes_and_caps() {
        let mut samples: Vec<_> = (0..250)
            .map(|i| (50.0, 60.0, 70.0, start() + Duration::days(10) + Duration::minutes(i)))
            .collect();
        // Stored out of order and far older than the newest sample
        samples.push((10.0, 10.0, 90.0, start()));

        let learner =
            BaselineLearner::from_json(&stored(&samples), &EngineConfig::default()).unwrap();
        assert_eq!(learner.sample_count(), 200);
        assert!(learner.samples().all(|s| s.rmssd == 50.0));
        let timestamps: Vec<_> = learner.samples().map(|s| s.timestamp).collect();
        assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_load_rejects_invalid_samples() {
        let config = EngineConfig::default();
        for bad in [
            (-3.0, 50.0, 70.0),
            (40.0, f64::NAN, 70.0),
            (40.0, 50.0, 0.0),
            (40.0, 50.0, f64::INFINITY),
        ] {
            let mut samples = vec![(45.0, 55.0, 68.0, start())];
            samples.push((bad.0, bad.1, bad.2, start() + Duration::hours(1)));
            let result = BaselineLearner::from_json(&stored(&samples), &config);
            assert!(matches!(result, Err(StressError::ParseError(_))), "{bad:?}");
        }

        // Zero variability from constant intervals is a legitimate measurement
        let samples = vec![(0.0, 0.0, 75.0, start())];
        assert!(BaselineLearner::from_json(&stored(&samples), &config).is_ok());
    }

    #[test]
    fn test_memory_repository() {
        let mut repo = MemoryRepository::new();
        assert!(repo.load(BASELINE_STORAGE_KEY).unwrap().is_none());
        repo.store(BASELINE_STORAGE_KEY, "{}").unwrap();
        assert_eq!(repo.load(BASELINE_STORAGE_KEY).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_file_repository() {
        let dir = std::env::temp_dir().join(format!("synheart-stress-{}", uuid::Uuid::new_v4()));
        let mut repo = FileRepository::new(&dir);
        assert!(repo.load(BASELINE_STORAGE_KEY).unwrap().is_none());

        let learner = BaselineLearner::default();
        repo.store(BASELINE_STORAGE_KEY, &learner.to_json().unwrap()).unwrap();
        let json = repo.load(BASELINE_STORAGE_KEY).unwrap().unwrap();
        assert!(BaselineLearner::from_json(&json, &EngineConfig::default()).is_ok());

        let _ = fs::remove_dir_all(&dir);
    }
}
