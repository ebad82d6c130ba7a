//! Stream error classification
//!
//! Every retry loop in the client decides what to do from the variant alone:
//!
//! | Variant | Session loop | Tail worker |
//! |---------|--------------|-------------|
//! | `EndOfStream` | drop stream, reconnect | exit quietly |
//! | `Cancelled` | shut down | exit |
//! | `ConnectionRefused` | back off, retry | back off, keep looping |
//! | anything else | back off, retry on same stream | log, keep looping |

use std::io;

use tether_protocol::ProtocolError;
use thiserror::Error;

/// Errors from opening, reading or writing a coordinator stream
#[derive(Debug, Error)]
pub enum StreamError {
    /// Peer closed the stream
    #[error("end of stream")]
    EndOfStream,

    /// Stream torn down by local shutdown
    #[error("stream cancelled")]
    Cancelled,

    /// Coordinator not reachable
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Any other temporary failure
    #[error("transient stream error: {0}")]
    Transient(String),

    /// Frame could not be decoded
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl StreamError {
    /// Peer closed the stream
    #[inline]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }

    /// Stream torn down by local shutdown
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Coordinator not reachable
    #[inline]
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, Self::ConnectionRefused(_))
    }
}

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::EndOfStream,
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused(err.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_classification() {
        let eof: StreamError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(eof.is_end_of_stream());

        let reset: StreamError = io::Error::from(io::ErrorKind::ConnectionReset).into();
        assert!(reset.is_end_of_stream());

        let refused: StreamError = io::Error::from(io::ErrorKind::ConnectionRefused).into();
        assert!(refused.is_connection_refused());
        assert!(!refused.is_end_of_stream());

        let other: StreamError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(matches!(other, StreamError::Io(_)));
        assert!(!other.is_cancelled());
    }

    #[test]
    fn test_cancelled() {
        assert!(StreamError::Cancelled.is_cancelled());
        assert!(!StreamError::Transient("x".into()).is_cancelled());
        assert!(StreamError::Cancelled.to_string().contains("cancelled"));
    }
}
