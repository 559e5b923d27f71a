//! Synheart Actigraph - Activity and sleep timeline engine for wrist-worn sensors
//!
//! Actigraph turns raw, irregularly sampled wearable logs into a disjoint
//! timeline of rest, low-active, high-active and sleep periods through a
//! deterministic pipeline: channel alignment → gap-aware resampling →
//! window classification → sleep/step reconciliation.
//!
//! ## Modules
//!
//! - **Signal conditioning**: `align`, `resample`
//! - **Classification**: `classify`, `sleep`, `timeline`, built on `interval`
//! - **Ingestion**: `schema` for the long-format measurement export

pub mod align;
pub mod classify;
pub mod config;
pub mod error;
pub mod interval;
pub mod observer;
pub mod pipeline;
pub mod resample;
pub mod schema;
pub mod sleep;
pub mod timeline;
pub mod types;

pub use config::PipelineConfig;
pub use error::ComputeError;
pub use observer::{NoopObserver, Observer, PipelineEvent, TracingObserver};
pub use pipeline::{process_session, ActivityProcessor};

// Schema exports
pub use schema::{RawRecord, RecordAdapter};

/// Actigraph version embedded in all session reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for session reports
pub const PRODUCER_NAME: &str = "synheart-actigraph";
