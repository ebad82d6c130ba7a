//! Tether - Transport
//!
//! Contracts for the three kinds of stream the client opens against the
//! coordinator, plus two implementations.
//!
//! # Streams
//!
//! ```text
//! Client                                   Coordinator
//!   │ ── Register ──────────────────────────► │  control stream (one per session)
//!   │ ◄─────────────────────────── Command ── │
//!   │                                         │
//!   │ ── OpenTail ──────────────────────────► │  tail stream (one per tail worker)
//!   │ ── TailRecord ────────────────────────► │
//!   │                                         │
//!   │ ── Schema ────────────────────────────► │  one-shot
//! ```
//!
//! # Implementations
//!
//! - [`TcpTransport`]: length-prefixed frames over TCP
//! - [`memory::MemoryTransport`]: scripted in-process transport for embedding
//!   and tests

use async_trait::async_trait;
use tether_protocol::{Command, RegisterRequest, SchemaUpdate, TailRecord};

mod error;
pub mod memory;
mod tcp;

pub use error::{Result, StreamError};
pub use tcp::{TcpTransport, TcpTransportConfig};

/// Opens streams to the coordinator
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open the control stream, sending the registration handshake
    async fn open_control_stream(&self, request: &RegisterRequest)
    -> Result<Box<dyn ControlStream>>;

    /// Open an outbound tail stream for this client session
    async fn open_tail_stream(&self, session_id: &str) -> Result<Box<dyn TailStream>>;

    /// Publish a schema update
    async fn send_schema(&self, update: &SchemaUpdate) -> Result<()>;
}

/// Inbound command stream
#[async_trait]
pub trait ControlStream: Send {
    /// Receive the next command
    ///
    /// Must be cancel safe: the session loop drops the future on shutdown.
    async fn recv(&mut self) -> Result<Command>;
}

/// Outbound tail record stream
#[async_trait]
pub trait TailStream: Send {
    /// Send one record
    async fn send(&mut self, record: TailRecord) -> Result<()>;

    /// Resolves once the coordinator has terminated the stream
    ///
    /// Must be cancel safe: tail workers poll it inside `select!`.
    async fn closed(&mut self);
}
