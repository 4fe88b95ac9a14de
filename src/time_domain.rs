//! Time-domain HRV estimation
//!
//! Statistical measures over a plain sequence of interval durations:
//! - RMSSD, SDNN, pNN50
//! - Baevsky stress index from the 50 ms interval histogram
//! - Mean heart rate

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum number of intervals for time-domain estimation
pub const MIN_TIME_DOMAIN_SAMPLES: usize = 5;

/// Histogram resolution for the Baevsky stress index (ms)
pub const STRESS_INDEX_BIN_MS: f64 = 50.0;

/// Successive-difference threshold for pNN50 (ms)
const NN50_THRESHOLD_MS: f64 = 50.0;

/// Time-domain metrics for one interval sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeDomainMetrics {
    pub rmssd: f64,
    pub sdnn: f64,
    pub pnn50: f64,
    pub stress_index: f64,
    pub mean_heart_rate: f64,
    pub sample_count: usize,
}

/// Compute time-domain metrics from interval durations (ms).
///
/// Fewer than [`MIN_TIME_DOMAIN_SAMPLES`] intervals yield zeroed metrics that
/// still report the sample count.
pub fn compute_time_domain(intervals: &[f64]) -> TimeDomainMetrics {
    let n = intervals.len();
    if n < MIN_TIME_DOMAIN_SAMPLES {
        return TimeDomainMetrics {
            sample_count: n,
            ..Default::default()
        };
    }

    let mean = intervals.iter().sum::<f64>() / n as f64;
    let mean_heart_rate = if mean > 0.0 {
        (60_000.0 / mean).round()
    } else {
        0.0
    };

    let diffs: Vec<f64> = intervals.windows(2).map(|w| w[1] - w[0]).collect();

    TimeDomainMetrics {
        rmssd: rmssd(&diffs),
        sdnn: sdnn(intervals, mean),
        pnn50: pnn50(&diffs),
        stress_index: baevsky_stress_index(intervals),
        mean_heart_rate,
        sample_count: n,
    }
}

/// Sample standard deviation (n - 1 denominator)
fn sdnn(intervals: &[f64], mean: f64) -> f64 {
    if intervals.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = intervals.iter().map(|x| (x - mean).powi(2)).sum();
    (sum_sq / (intervals.len() - 1) as f64).sqrt()
}

fn rmssd(diffs: &[f64]) -> f64 {
    if diffs.is_empty() {
        return 0.0;
    }
    let mean_sq = diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64;
    mean_sq.sqrt()
}

fn pnn50(diffs: &[f64]) -> f64 {
    if diffs.is_empty() {
        return 0.0;
    }
    let nn50 = diffs.iter().filter(|d| d.abs() > NN50_THRESHOLD_MS).count();
    100.0 * nn50 as f64 / diffs.len() as f64
}

/// Baevsky stress index: `AMo / (2 · VR · Mo)` with VR and Mo in seconds.
///
/// Mo is the center of the most populated 50 ms bin (lowest bin wins ties),
/// AMo its share of all intervals in percent, VR the max-min range.
pub fn baevsky_stress_index(intervals: &[f64]) -> f64 {
    if intervals.is_empty() {
        return 0.0;
    }

    let mut bins: BTreeMap<i64, usize> = BTreeMap::new();
    for &x in intervals {
        let bin = (x / STRESS_INDEX_BIN_MS).floor() as i64;
        *bins.entry(bin).or_insert(0) += 1;
    }

    let mut modal_bin = 0_i64;
    let mut modal_count = 0_usize;
    for (&bin, &count) in &bins {
        if count > modal_count {
            modal_bin = bin;
            modal_count = count;
        }
    }

    let mode_ms = modal_bin as f64 * STRESS_INDEX_BIN_MS + STRESS_INDEX_BIN_MS / 2.0;
    let amplitude_pct = 100.0 * modal_count as f64 / intervals.len() as f64;

    let max = intervals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = intervals.iter().copied().fold(f64::INFINITY, f64::min);
    let range_ms = max - min;

    if mode_ms <= 0.0 || range_ms <= 0.0 {
        tracing::debug!(mode_ms, range_ms, "degenerate histogram, stress index set to 0");
        return 0.0;
    }

    amplitude_pct / (2.0 * (range_ms / 1000.0) * (mode_ms / 1000.0))
}
