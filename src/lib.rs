//! Synheart Stress - On-device HRV analysis and explainable stress scoring
//!
//! The engine turns a stream of beat-to-beat intervals into stress readings
//! through a deterministic pipeline: interval validation → windowed buffering →
//! time-domain and spectral HRV estimation → personal baseline learning →
//! weighted multi-feature classification.
//!
//! ## Modules
//!
//! - **Estimation**: `time_domain` (RMSSD, SDNN, pNN50, Baevsky SI) and
//!   `spectral` (Lomb-Scargle LF/HF powers)
//! - **Session**: `pipeline::StressProcessor` drives ingest, baseline and
//!   classification against an injectable clock
//! - **Edges**: `sources` for interval producers, `encoder` for JSON reports,
//!   `ffi` for C interop

pub mod baseline;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod encoder;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod sources;
pub mod spectral;
pub mod time_domain;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use baseline::{
    BaselineLearner, BaselineRepository, BaselineState, FileRepository, MemoryRepository,
};
pub use classifier::StressClassifier;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use encoder::{StressEncoder, StressReport};
pub use error::StressError;
pub use ingest::{IngestOutcome, RejectReason};
pub use pipeline::{snapshot_from_intervals, StressProcessor, StressReading};
pub use sources::{IntervalSource, ReplaySource, SimulatedSource, SourceManager};
pub use types::{
    BeatInterval, DataQuality, MetricsSnapshot, PersonalBaseline, StressFeature, StressLevel,
    StressResult,
};

/// Engine version embedded in all reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "synheart-stress";
