//! Tail request and record types
//!
//! A tail is an on-demand diagnostic subscription: while it is active, every
//! payload that runs through the tailed pipeline is streamed back to the
//! coordinator as a `TailRecord` holding the before/after bytes.

use bytes::Bytes;

use crate::audience::Audience;

/// Whether a tail request starts or stops a tail
///
/// NOTE: These values are used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TailRequestType {
    /// Not set
    #[default]
    Unset = 0,
    /// Start tailing
    Start = 1,
    /// Stop tailing
    Stop = 2,
}

impl TailRequestType {
    /// Parse request type from raw byte value
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Start,
            2 => Self::Stop,
            _ => Self::Unset,
        }
    }
}

/// Tail request carried by TailStart / TailStop commands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TailRequest {
    /// Tail id, unique per (audience, pipeline)
    pub id: String,
    /// Audience whose pipeline is tailed
    pub audience: Audience,
    /// Tailed pipeline
    pub pipeline_id: String,
    /// Start or stop
    pub request_type: TailRequestType,
}

impl TailRequest {
    /// Build a start request
    pub fn start(
        id: impl Into<String>,
        audience: Audience,
        pipeline_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            audience,
            pipeline_id: pipeline_id.into(),
            request_type: TailRequestType::Start,
        }
    }

    /// Build a stop request
    pub fn stop(
        id: impl Into<String>,
        audience: Audience,
        pipeline_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            audience,
            pipeline_id: pipeline_id.into(),
            request_type: TailRequestType::Stop,
        }
    }
}

/// Kind of tail response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TailResponseType {
    /// Not set
    #[default]
    Unset = 0,
    /// Carries before/after payload bytes
    Payload = 1,
}

impl TailResponseType {
    /// Parse response type from raw byte value
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Payload,
            _ => Self::Unset,
        }
    }
}

/// One before/after payload pair streamed to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailRecord {
    /// Response type
    pub response_type: TailResponseType,
    /// Id of the tail request this record answers
    pub tail_request_id: String,
    /// Audience the payload belongs to
    pub audience: Audience,
    /// Pipeline that produced `new_data`
    pub pipeline_id: String,
    /// Client session id
    pub session_id: String,
    /// Wall-clock timestamp, nanoseconds since the Unix epoch
    pub timestamp_ns: i64,
    /// Payload before the pipeline ran
    pub original_data: Bytes,
    /// Payload after the pipeline ran
    pub new_data: Bytes,
}
