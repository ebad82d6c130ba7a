//! Protocol error types
//!
//! Errors that can occur when encoding or decoding control-plane frames.

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame ended before a field could be read
    #[error("truncated {0}")]
    Truncated(&'static str),

    /// Frame is empty (no message type byte)
    #[error("empty frame")]
    EmptyFrame,

    /// Unknown frame message type
    #[error("unknown message type: {0:#04x}")]
    UnknownMessageType(u8),

    /// Unknown command discriminant
    #[error("unknown command type: {0}")]
    UnknownCommandType(u8),

    /// String field is not valid UTF-8
    #[error("invalid UTF-8 in {field}: {message}")]
    InvalidUtf8 {
        field: &'static str,
        message: String,
    },

    /// Frame exceeds the maximum allowed size
    #[error("frame size {size} exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },
}

impl ProtocolError {
    /// Create a frame too large error
    #[inline]
    pub fn frame_too_large(size: usize) -> Self {
        Self::FrameTooLarge {
            size,
            max: crate::MAX_FRAME_SIZE,
        }
    }

    /// Check if the stream can keep reading after this error
    ///
    /// Unknown discriminants are skippable because the frame was fully read;
    /// truncation and oversize frames leave the stream out of sync.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownMessageType(_) | Self::UnknownCommandType(_) | Self::InvalidUtf8 { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert!(
            ProtocolError::Truncated("audience")
                .to_string()
                .contains("audience")
        );
        assert!(
            ProtocolError::UnknownMessageType(0x7f)
                .to_string()
                .contains("0x7f")
        );

        let err = ProtocolError::frame_too_large(usize::MAX);
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_recoverable() {
        assert!(ProtocolError::UnknownCommandType(42).is_recoverable());
        assert!(!ProtocolError::Truncated("string").is_recoverable());
        assert!(!ProtocolError::frame_too_large(1 << 30).is_recoverable());
    }
}
