//! Frequency-domain HRV estimation
//!
//! Beat intervals are unevenly spaced in time, so instead of resampling for an
//! FFT the power spectrum is estimated directly from (time, value) pairs with a
//! Lomb-Scargle periodogram. Band powers are integrated with the trapezoidal
//! rule, interpolating the periodogram at the band edges.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Minimum samples for the periodogram to be evaluated at all
pub const MIN_PERIODOGRAM_SAMPLES: usize = 4;

/// Minimum samples for band powers to be reported
pub const MIN_SPECTRAL_SAMPLES: usize = 20;

/// Number of points in the frequency grid
pub const FREQUENCY_POINTS: usize = 256;

pub const MIN_FREQUENCY_HZ: f64 = 0.01;
pub const MAX_FREQUENCY_HZ: f64 = 0.5;

/// Low-frequency band (Hz)
pub const LF_BAND: (f64, f64) = (0.04, 0.15);

/// High-frequency band (Hz)
pub const HF_BAND: (f64, f64) = (0.15, 0.4);

/// Frequency-domain metrics for one interval sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyDomainMetrics {
    pub lf_power: f64,
    pub hf_power: f64,
    pub lf_hf_ratio: f64,
}

/// Power evaluated on an ascending frequency grid
#[derive(Debug, Clone, PartialEq)]
pub struct Periodogram {
    frequencies: Vec<f64>,
    power: Vec<f64>,
}

/// Evenly spaced grid of [`FREQUENCY_POINTS`] frequencies from 0.01 to 0.5 Hz
pub fn frequency_grid() -> Vec<f64> {
    let step = (MAX_FREQUENCY_HZ - MIN_FREQUENCY_HZ) / (FREQUENCY_POINTS - 1) as f64;
    (0..FREQUENCY_POINTS)
        .map(|k| MIN_FREQUENCY_HZ + k as f64 * step)
        .collect()
}

/// Convert interval durations (ms) into sample times in seconds from the first beat.
///
/// The first sample sits at 0; each following sample is offset by its own duration.
pub fn cumulative_times(intervals: &[f64]) -> Vec<f64> {
    let mut t = 0.0;
    intervals
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            if i > 0 {
                t += x / 1000.0;
            }
            t
        })
        .collect()
}

/// Lomb-Scargle periodogram of `values` sampled at `times` (seconds).
///
/// Returns `None` with fewer than [`MIN_PERIODOGRAM_SAMPLES`] samples or
/// mismatched inputs. A zero-variance signal yields an all-zero spectrum.
pub fn lomb_scargle(times: &[f64], values: &[f64], frequencies: &[f64]) -> Option<Periodogram> {
    let n = values.len();
    if n < MIN_PERIODOGRAM_SAMPLES || times.len() != n {
        return None;
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;

    if variance <= f64::EPSILON {
        return Some(Periodogram {
            frequencies: frequencies.to_vec(),
            power: vec![0.0; frequencies.len()],
        });
    }

    let power = frequencies
        .iter()
        .map(|&f| power_at(times, values, mean, 2.0 * PI * f))
        .collect();

    Some(Periodogram {
        frequencies: frequencies.to_vec(),
        power,
    })
}

fn power_at(times: &[f64], values: &[f64], mean: f64, omega: f64) -> f64 {
    let (sin_2wt, cos_2wt) = times.iter().fold((0.0, 0.0), |(s, c), &t| {
        (s + (2.0 * omega * t).sin(), c + (2.0 * omega * t).cos())
    });
    let tau = sin_2wt.atan2(cos_2wt) / (2.0 * omega);

    let mut cos_sum = 0.0;
    let mut cos_den = 0.0;
    let mut sin_sum = 0.0;
    let mut sin_den = 0.0;
    for (&t, &x) in times.iter().zip(values) {
        let phase = omega * (t - tau);
        let (s, c) = phase.sin_cos();
        let centered = x - mean;
        cos_sum += centered * c;
        cos_den += c * c;
        sin_sum += centered * s;
        sin_den += s * s;
    }

    let mut power = 0.0;
    if cos_den > 0.0 {
        power += cos_sum * cos_sum / cos_den;
    }
    if sin_den > 0.0 {
        power += sin_sum * sin_sum / sin_den;
    }
    0.5 * power
}

impl Periodogram {
    /// Pair a frequency grid with its power values; `None` if the lengths differ
    pub fn new(frequencies: Vec<f64>, power: Vec<f64>) -> Option<Self> {
        if frequencies.len() != power.len() {
            return None;
        }
        Some(Self { frequencies, power })
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn power(&self) -> &[f64] {
        &self.power
    }

    /// Linearly interpolated power at `frequency`, clamped to the grid ends
    pub fn power_at(&self, frequency: f64) -> f64 {
        let (freqs, power) = (&self.frequencies, &self.power);
        if freqs.is_empty() {
            return 0.0;
        }
        if frequency <= freqs[0] {
            return power[0];
        }
        let last = freqs.len() - 1;
        if frequency >= freqs[last] {
            return power[last];
        }

        let upper = freqs.partition_point(|&f| f < frequency);
        let lower = upper - 1;
        let span = freqs[upper] - freqs[lower];
        if span <= 0.0 {
            return power[upper];
        }
        let t = (frequency - freqs[lower]) / span;
        power[lower] + t * (power[upper] - power[lower])
    }

    /// Trapezoidal integral of the periodogram over `[low, high]`
    pub fn band_power(&self, low: f64, high: f64) -> f64 {
        if high <= low || self.frequencies.is_empty() {
            return 0.0;
        }

        let mut points = Vec::with_capacity(self.frequencies.len() + 2);
        points.push((low, self.power_at(low)));
        points.extend(
            self.frequencies
                .iter()
                .zip(&self.power)
                .filter(|(&f, _)| f > low && f < high)
                .map(|(&f, &p)| (f, p)),
        );
        points.push((high, self.power_at(high)));

        points
            .windows(2)
            .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0)
            .sum()
    }

    /// Frequency with the highest power
    pub fn peak_frequency(&self) -> Option<f64> {
        self.power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| self.frequencies[i])
    }
}

/// LF/HF band powers of an interval sequence (ms).
///
/// Sequences shorter than [`MIN_SPECTRAL_SAMPLES`] are not considered
/// meaningful and yield zero band powers.
pub fn compute_frequency_domain(intervals: &[f64]) -> FrequencyDomainMetrics {
    if intervals.len() < MIN_SPECTRAL_SAMPLES {
        return FrequencyDomainMetrics::default();
    }

    let times = cumulative_times(intervals);
    let periodogram = match lomb_scargle(&times, intervals, &frequency_grid()) {
        Some(p) => p,
        None => return FrequencyDomainMetrics::default(),
    };

    let lf_power = periodogram.band_power(LF_BAND.0, LF_BAND.1);
    let hf_power = periodogram.band_power(HF_BAND.0, HF_BAND.1);
    let lf_hf_ratio = if hf_power > 0.0 {
        lf_power / hf_power
    } else {
        0.0
    };

    FrequencyDomainMetrics {
        lf_power,
        hf_power,
        lf_hf_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Intervals modulated by a sinusoid at `freq_hz`, `beats` long
    fn modulated(freq_hz: f64, amplitude_ms: f64, beats: usize) -> Vec<f64> {
        let mut t = 0.0;
        let mut out = Vec::with_capacity(beats);
        for _ in 0..beats {
            let x = 1000.0 + amplitude_ms * (2.0 * PI * freq_hz * t).sin();
            out.push(x);
            t += x / 1000.0;
        }
        out
    }

    #[test]
    fn test_frequency_grid() {
        let grid = frequency_grid();
        assert_eq!(grid.len(), 256);
        assert!((grid[0] - 0.01).abs() < 1e-12);
        assert!((grid[255] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_cumulative_times() {
        let times = cumulative_times(&[800.0, 1000.0, 1200.0]);
        assert_eq!(times.len(), 3);
        assert_eq!(times[0], 0.0);
        assert!((times[1] - 1.0).abs() < 1e-12);
        assert!((times[2] - 2.2).abs() < 1e-12);
    }

    #[test]
    fn test_periodogram_requires_four_samples() {
        let grid = frequency_grid();
        assert!(lomb_scargle(&[0.0, 1.0, 2.0], &[1.0, 2.0, 3.0], &grid).is_none());
        assert!(lomb_scargle(&[0.0, 1.0, 2.0, 3.0], &[1.0, 2.0, 1.0, 2.0], &grid).is_some());
    }

    #[test]
    fn test_zero_variance_gives_zero_power() {
        let values = vec![800.0; 30];
        let times = cumulative_times(&values);
        let periodogram = lomb_scargle(&times, &values, &frequency_grid()).unwrap();
        assert!(periodogram.power().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_peak_at_respiratory_frequency() {
        let intervals = modulated(0.25, 50.0, 180);
        let times = cumulative_times(&intervals);
        let periodogram = lomb_scargle(&times, &intervals, &frequency_grid()).unwrap();
        let peak = periodogram.peak_frequency().unwrap();
        assert!((peak - 0.25).abs() < 0.02, "peak at {peak}");
    }

    #[test]
    fn test_hf_dominates_for_fast_modulation() {
        let metrics = compute_frequency_domain(&modulated(0.25, 50.0, 180));
        assert!(metrics.hf_power > metrics.lf_power);
        assert!(metrics.lf_hf_ratio < 1.0);
        assert!(metrics.lf_hf_ratio > 0.0);
    }

    #[test]
    fn test_lf_dominates_for_slow_modulation() {
        let metrics = compute_frequency_domain(&modulated(0.1, 50.0, 180));
        assert!(metrics.lf_power > metrics.hf_power);
        assert!(metrics.lf_hf_ratio > 1.0);
    }

    #[test]
    fn test_short_sequence_gives_zero_bands() {
        let metrics = compute_frequency_domain(&modulated(0.25, 50.0, 19));
        assert_eq!(metrics, FrequencyDomainMetrics::default());
    }

    #[test]
    fn test_band_power_of_flat_spectrum() {
        let periodogram = Periodogram::new(frequency_grid(), vec![2.0; FREQUENCY_POINTS]).unwrap();
        let lf = periodogram.band_power(LF_BAND.0, LF_BAND.1);
        assert!((lf - 2.0 * 0.11).abs() < 1e-9);
    }

    #[test]
    fn test_interpolation_between_grid_points() {
        let periodogram = Periodogram::new(vec![0.1, 0.2], vec![10.0, 20.0]).unwrap();
        assert!((periodogram.power_at(0.15) - 15.0).abs() < 1e-9);
        assert_eq!(periodogram.power_at(0.05), 10.0);
        assert_eq!(periodogram.power_at(0.3), 20.0);
    }

    #[test]
    fn test_periodogram_rejects_mismatched_lengths() {
        assert!(Periodogram::new(vec![0.1, 0.2, 0.3], vec![1.0]).is_none());
        assert!(Periodogram::new(Vec::new(), Vec::new()).is_some());
    }
}
