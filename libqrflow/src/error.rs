//! Error types for Qrflow

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QrflowError>;

#[derive(Error, Debug)]
pub enum QrflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Orchestrator is no longer running")]
    Closed,
}

impl QrflowError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            QrflowError::InvalidInput(_) => 3,
            QrflowError::Config(_) => 1,
            QrflowError::Adapter(_) => 1,
            QrflowError::Closed => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Failure reported by a validation or generation adapter.
///
/// These never leave the coordinator as errors; they are folded into
/// `ValidationFailed` / `GenerationFailed` events.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Could not decode response: {0}")]
    Decode(String),
}
