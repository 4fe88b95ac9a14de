//! Deterministic synthetic interval generator
//!
//! Intervals follow a mean value modulated by respiratory sinus arrhythmia
//! (HF band) and the Mayer wave (LF band), so both spectral bands carry power.

use chrono::{DateTime, Duration, Utc};
use std::f64::consts::PI;

use super::IntervalSource;
use crate::error::StressError;
use crate::types::{BeatInterval, MAX_INTERVAL_MS, MIN_INTERVAL_MS};

/// Respiratory sinus arrhythmia frequency (Hz)
pub const RSA_HZ: f64 = 0.25;

/// Mayer wave frequency (Hz)
pub const MAYER_WAVE_HZ: f64 = 0.1;

const DEFAULT_RSA_AMPLITUDE_MS: f64 = 40.0;
const DEFAULT_MAYER_AMPLITUDE_MS: f64 = 25.0;

/// Synthetic source producing a reproducible interval sequence
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    mean_ms: f64,
    rsa_amplitude_ms: f64,
    mayer_amplitude_ms: f64,
    running: bool,
    /// Timestamp of the last emitted beat
    last_beat: Option<DateTime<Utc>>,
    /// Seconds since start, at the last emitted beat
    elapsed_secs: f64,
}

impl SimulatedSource {
    /// Create a source around `mean_ms` with default modulation depths
    pub fn new(mean_ms: f64) -> Result<Self, StressError> {
        Self::with_modulation(mean_ms, DEFAULT_RSA_AMPLITUDE_MS, DEFAULT_MAYER_AMPLITUDE_MS)
    }

    /// Create a source with explicit modulation amplitudes (ms)
    pub fn with_modulation(
        mean_ms: f64,
        rsa_amplitude_ms: f64,
        mayer_amplitude_ms: f64,
    ) -> Result<Self, StressError> {
        let swing = rsa_amplitude_ms.abs() + mayer_amplitude_ms.abs();
        if !(mean_ms - swing >= MIN_INTERVAL_MS && mean_ms + swing <= MAX_INTERVAL_MS) {
            return Err(StressError::SourceError(format!(
                "simulated intervals {mean_ms}±{swing} ms leave the plausible range"
            )));
        }
        Ok(Self {
            mean_ms,
            rsa_amplitude_ms,
            mayer_amplitude_ms,
            running: false,
            last_beat: None,
            elapsed_secs: 0.0,
        })
    }

    fn interval_at(&self, t: f64) -> f64 {
        self.mean_ms
            + self.rsa_amplitude_ms * (2.0 * PI * RSA_HZ * t).sin()
            + self.mayer_amplitude_ms * (2.0 * PI * MAYER_WAVE_HZ * t).sin()
    }
}

impl IntervalSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    fn start(&mut self, at: DateTime<Utc>) -> Result<(), StressError> {
        self.running = true;
        self.last_beat = Some(at);
        self.elapsed_secs = 0.0;
        tracing::debug!(mean_ms = self.mean_ms, "simulated source started");
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn poll(&mut self, now: DateTime<Utc>) -> Result<Vec<BeatInterval>, StressError> {
        let mut last = match (self.running, self.last_beat) {
            (true, Some(last)) => last,
            _ => {
                return Err(StressError::SourceError(
                    "simulated source is not running".to_string(),
                ))
            }
        };

        let mut out = Vec::new();
        loop {
            let duration_ms = self.interval_at(self.elapsed_secs);
            let next = last + Duration::microseconds((duration_ms * 1000.0).round() as i64);
            if next > now {
                break;
            }
            out.push(BeatInterval::new(next, duration_ms));
            self.elapsed_secs += duration_ms / 1000.0;
            last = next;
        }
        self.last_beat = Some(last);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::ingest::IntervalBuffer;
    use crate::spectral::compute_frequency_domain;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_rejects_implausible_mean() {
        assert!(SimulatedSource::new(250.0).is_err());
        assert!(SimulatedSource::new(1990.0).is_err());
        assert!(SimulatedSource::new(800.0).is_ok());
    }

    #[test]
    fn test_poll_requires_start() {
        let mut source = SimulatedSource::new(800.0).unwrap();
        assert!(source.poll(start()).is_err());
    }

    #[test]
    fn test_deterministic_output() {
        let mut a = SimulatedSource::new(800.0).unwrap();
        let mut b = SimulatedSource::new(800.0).unwrap();
        a.start(start()).unwrap();
        b.start(start()).unwrap();

        let end = start() + Duration::seconds(30);
        assert_eq!(a.poll(end).unwrap(), b.poll(end).unwrap());
    }

    #[test]
    fn test_incremental_poll_matches_single_poll() {
        let mut whole = SimulatedSource::new(900.0).unwrap();
        let mut parts = SimulatedSource::new(900.0).unwrap();
        whole.start(start()).unwrap();
        parts.start(start()).unwrap();

        let all = whole.poll(start() + Duration::seconds(20)).unwrap();
        let mut pieces = parts.poll(start() + Duration::seconds(7)).unwrap();
        pieces.extend(parts.poll(start() + Duration::seconds(20)).unwrap());
        assert_eq!(all, pieces);
    }

    #[test]
    fn test_intervals_pass_validation() {
        let mut source = SimulatedSource::new(800.0).unwrap();
        source.start(start()).unwrap();
        let intervals = source.poll(start() + Duration::seconds(60)).unwrap();
        assert!(intervals.len() > 60);

        let mut buffer = IntervalBuffer::new(&EngineConfig::default());
        for interval in &intervals {
            assert!(buffer.add(*interval).is_accepted());
        }
    }

    #[test]
    fn test_both_bands_carry_power() {
        let mut source = SimulatedSource::new(800.0).unwrap();
        source.start(start()).unwrap();
        let durations: Vec<f64> = source
            .poll(start() + Duration::seconds(120))
            .unwrap()
            .iter()
            .map(|i| i.duration_ms)
            .collect();

        let metrics = compute_frequency_domain(&durations);
        assert!(metrics.lf_power > 0.0);
        assert!(metrics.hf_power > 0.0);
    }
}
