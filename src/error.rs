//! Error types for Synheart Stress
//!
//! The signal-processing core never fails: implausible intervals are dropped
//! and short buffers yield typed insufficient-data results. These errors only
//! surface at the edges (configuration, persistence, sources, JSON).

use thiserror::Error;

/// Errors that can occur outside the estimation core
#[derive(Debug, Error)]
pub enum StressError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid beat interval: {0}")]
    InvalidInterval(String),

    #[error("Baseline persistence error: {0}")]
    Persistence(String),

    #[error("Interval source error: {0}")]
    SourceError(String),
}
