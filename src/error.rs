//! Error types for Pressure Flux

use chrono::NaiveDate;
use thiserror::Error;

/// Errors surfaced to callers of the engine
#[derive(Debug, Error)]
pub enum PressureError {
    #[error("Failed to persist '{key}': {message}")]
    Persistence { key: String, message: String },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Engine state lock poisoned")]
    LockPoisoned,

    #[error("No pressure record for {0}")]
    UnknownRecord(NaiveDate),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl PressureError {
    pub(crate) fn persistence(key: &str, err: impl std::fmt::Display) -> Self {
        PressureError::Persistence {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

/// Failures of the external analysis collaborator.
///
/// These never reach settlement callers: the adapter absorbs every variant
/// through the local fallback heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("Analysis credential is not configured")]
    MissingCredential,

    #[error("Analysis transport failed: {0}")]
    TransportError(String),

    #[error("Malformed analysis response: {0}")]
    MalformedResponse(String),
}
