//! Pipeline store error types

use thiserror::Error;

/// Pipeline store errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// Pause on a pipeline that is not active
    #[error("pipeline '{pipeline_id}' not active or does not exist for audience {audience}")]
    NotActive {
        audience: String,
        pipeline_id: String,
    },

    /// Resume on a pipeline that is not paused
    #[error("pipeline '{pipeline_id}' not paused for audience {audience}")]
    NotPaused {
        audience: String,
        pipeline_id: String,
    },

    /// Command carried no payload
    #[error("empty command")]
    EmptyCommand,
}

impl PipelineError {
    /// Whether this is a not-found error (pause/resume on an unknown pipeline)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotActive { .. } | Self::NotPaused { .. })
    }
}

/// Result type for pipeline store operations
pub type Result<T> = std::result::Result<T, PipelineError>;
