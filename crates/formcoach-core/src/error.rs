//! Error types for the form coach core

use thiserror::Error;

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by the coach core.
///
/// Degenerate geometry and low confidence are not errors: they are handled in-band
/// (0° sentinel, "neutral" phase). Only configuration problems and session misuse
/// reach the caller; advisory failures are reported here but always recovered by
/// the session with a fallback message.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("No form criteria available for exercise '{0}'")]
    UnknownExercise(String),

    #[error("Session {0} has ended")]
    SessionEnded(String),

    #[error("Advisory service error: {0}")]
    Advisory(String),

    #[error("Advisory request timed out after {0}s")]
    AdvisoryTimeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}
