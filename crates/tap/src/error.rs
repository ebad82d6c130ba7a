//! Error types for the tap crate

use thiserror::Error;

/// Errors that can occur in the tail system
#[derive(Error, Debug)]
pub enum TapError {
    /// Command failed structural validation
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TapError {
    /// Create an invalid command error
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidCommand(reason.into())
    }
}

/// Result type for tap operations
pub type Result<T> = std::result::Result<T, TapError>;
