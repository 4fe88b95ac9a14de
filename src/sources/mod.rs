//! Interval sources
//!
//! This module provides producers of beat intervals: a deterministic
//! simulator for demos and tests, and a replay source for recorded sessions.
//! The [`SourceManager`] keeps at most one source active at a time.

mod replay;
mod simulator;

pub use replay::ReplaySource;
pub use simulator::{SimulatedSource, MAYER_WAVE_HZ, RSA_HZ};

use chrono::{DateTime, Utc};

use crate::error::StressError;
use crate::types::BeatInterval;

/// Trait for producers of beat intervals
pub trait IntervalSource: Send {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Begin producing intervals from `at` onward
    fn start(&mut self, at: DateTime<Utc>) -> Result<(), StressError>;

    /// Stop producing intervals. Stopping an idle source is a no-op.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Intervals whose beats occurred up to and including `now`, oldest first
    fn poll(&mut self, now: DateTime<Utc>) -> Result<Vec<BeatInterval>, StressError>;
}

/// Holds the single active interval source
#[derive(Default)]
pub struct SourceManager {
    active: Option<Box<dyn IntervalSource>>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the current source (if any) and start `source` in its place
    pub fn switch_to(
        &mut self,
        mut source: Box<dyn IntervalSource>,
        at: DateTime<Utc>,
    ) -> Result<(), StressError> {
        if let Some(mut previous) = self.active.take() {
            previous.stop();
            tracing::info!(from = previous.name(), to = source.name(), "switching interval source");
        }
        source.start(at)?;
        self.active = Some(source);
        Ok(())
    }

    /// Stop and drop the active source
    pub fn stop(&mut self) {
        if let Some(mut source) = self.active.take() {
            source.stop();
        }
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref().map(|s| s.name())
    }

    pub fn is_running(&self) -> bool {
        self.active.as_deref().is_some_and(|s| s.is_running())
    }

    /// Poll the active source. No source yields no intervals.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Result<Vec<BeatInterval>, StressError> {
        match self.active.as_deref_mut() {
            Some(source) => source.poll(now),
            None => Ok(Vec::new()),
        }
    }
}
