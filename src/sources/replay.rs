//! Replay of recorded intervals

use chrono::{DateTime, Utc};

use super::IntervalSource;
use crate::error::StressError;
use crate::types::BeatInterval;

/// Replays a recorded interval sequence against the caller's clock
#[derive(Debug, Clone)]
pub struct ReplaySource {
    name: String,
    intervals: Vec<BeatInterval>,
    cursor: usize,
    running: bool,
}

impl ReplaySource {
    /// Create a replay source. Intervals are sorted by timestamp.
    pub fn new(name: impl Into<String>, mut intervals: Vec<BeatInterval>) -> Self {
        intervals.sort_by_key(|i| i.timestamp);
        Self {
            name: name.into(),
            intervals,
            cursor: 0,
            running: false,
        }
    }

    /// Intervals not yet emitted
    pub fn remaining(&self) -> usize {
        self.intervals.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

impl IntervalSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    /// Rewind to the first recorded interval
    fn start(&mut self, _at: DateTime<Utc>) -> Result<(), StressError> {
        self.cursor = 0;
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn poll(&mut self, now: DateTime<Utc>) -> Result<Vec<BeatInterval>, StressError> {
        if !self.running {
            return Err(StressError::SourceError(format!(
                "replay source '{}' is not running",
                self.name
            )));
        }
        let pending = &self.intervals[self.cursor..];
        let due = pending.partition_point(|i| i.timestamp <= now);
        let out = pending[..due].to_vec();
        self.cursor += due;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn recording() -> Vec<BeatInterval> {
        vec![
            BeatInterval::new(at(3), 1000.0),
            BeatInterval::new(at(1), 800.0),
            BeatInterval::new(at(2), 900.0),
        ]
    }

    #[test]
    fn test_replays_in_time_order() {
        let mut source = ReplaySource::new("session", recording());
        source.start(at(0)).unwrap();

        let first = source.poll(at(2)).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].duration_ms, 800.0);
        assert_eq!(first[1].duration_ms, 900.0);
        assert_eq!(source.remaining(), 1);

        assert!(source.poll(at(2)).unwrap().is_empty());
        assert_eq!(source.poll(at(10)).unwrap().len(), 1);
        assert!(source.is_exhausted());
    }

    #[test]
    fn test_restart_rewinds() {
        let mut source = ReplaySource::new("session", recording());
        source.start(at(0)).unwrap();
        source.poll(at(10)).unwrap();

        source.stop();
        assert!(source.poll(at(10)).is_err());

        source.start(at(0)).unwrap();
        assert_eq!(source.remaining(), 3);
    }
}
