//! Error types for the client

use tether_pipeline::PipelineError;
use tether_tap::TapError;
use tether_transport::StreamError;
use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the client
///
/// Only `Registration` and `InvalidConfig` ever leave [`Client::start`];
/// command-level errors end up in the log.
///
/// [`Client::start`]: crate::Client::start
#[derive(Debug, Error)]
pub enum ClientError {
    /// Initial registration with the coordinator failed
    #[error("failed to register with coordinator: {0}")]
    Registration(#[source] StreamError),

    /// Client options are unusable
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    /// Pipeline command failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Tail command failed
    #[error(transparent)]
    Tap(#[from] TapError),
}
