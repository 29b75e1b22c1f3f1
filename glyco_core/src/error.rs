//! Error types for the glyco_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for glyco_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Out-of-domain input to a pure function (NaN, negative units, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot or journal could not be written or restored
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Notification collaborator failed to deliver
    #[error("Notification error: {0}")]
    Notification(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Reject NaN, infinities and negatives with a descriptive error
pub(crate) fn ensure_non_negative(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(Error::InvalidInput(format!("{} must be finite, got {}", name, value)));
    }
    if value < 0.0 {
        return Err(Error::InvalidInput(format!(
            "{} must be non-negative, got {}",
            name, value
        )));
    }
    Ok(value)
}
