//! Tether Protocol - message types for the control-plane client
//!
//! This crate provides the values that flow between the client and the
//! coordinator:
//! - `Audience` / `AudienceKey` - identity of a data flow, used as map key
//! - `Pipeline` / `PipelineStep` / `StepResult` - attached pipelines and step outcomes
//! - `Command` / `CommandKind` - imperative instructions from the coordinator
//! - `TailRequest` / `TailRecord` - tail subscriptions and streamed payload pairs
//! - `RegisterRequest` / `ClientInfo` - control stream handshake
//! - `SchemaUpdate` - inferred schema published to the coordinator
//! - `Frame` - length-prefixed binary codec for all of the above
//!
//! # Design Principles
//!
//! - **Plain values**: no I/O, no locks; every type is `Clone + Send`
//! - **Zero-copy payloads**: payload bytes use `bytes::Bytes`
//! - **Stable wire values**: `#[repr(u8)]` enums with explicit discriminants

mod audience;
mod codec;
mod command;
mod error;
mod pipeline;
mod register;
mod schema;
mod tail;

pub use audience::{Audience, AudienceKey, OperationType};
pub use codec::{Frame, read_length_prefix};
pub use command::{Command, CommandKind};
pub use error::ProtocolError;
pub use pipeline::{ExitCode, Pipeline, PipelineStep, StepKind, StepResult};
pub use register::{ClientInfo, ClientType, LIBRARY_NAME, LIBRARY_VERSION, RegisterRequest};
pub use schema::SchemaUpdate;
pub use tail::{TailRecord, TailRequest, TailRequestType, TailResponseType};

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Maximum frame size (16MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
