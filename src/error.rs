//! Error types for Synheart Actigraph

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Malformed record {record}: {reason}")]
    DataFormat { record: usize, reason: String },

    #[error("No channel alignment found at index {index} ({timestamp}) with window {window}")]
    AlignmentExhaustion {
        index: usize,
        timestamp: DateTime<Utc>,
        window: usize,
    },

    #[error("Timeline invariant violated at entry {index} ({timestamp}): {detail}")]
    InvariantViolation {
        index: usize,
        timestamp: DateTime<Utc>,
        detail: String,
    },

    #[error("Insufficient data for computation: {0}")]
    InsufficientData(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
