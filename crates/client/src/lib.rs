//! Tether Client
//!
//! Control-plane client embedded in a host application that runs data
//! pipelines. It keeps a session with the coordinator, applies the commands
//! it receives to local pipeline state, and streams tail and schema data
//! back on demand.
//!
//! # Architecture
//!
//! ```text
//! Coordinator                      Client                        Pipeline engine
//!
//!  commands ──► SessionManager ──┬──► PipelineStore ◄──── active_pipelines_for()
//!                                └──► TailRegistry  ◄──── publish_tail()
//!  tails    ◄──────────────────────── (workers)
//!  schemas  ◄──────────────────────── SchemaCache   ◄──── notify_schema_output()
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tether_client::{Client, ClientOptions};
//! use tether_transport::{TcpTransport, TcpTransportConfig};
//!
//! let transport = Arc::new(TcpTransport::new(TcpTransportConfig::new("127.0.0.1:9090")));
//! let client = Client::start(ClientOptions::new("billing"), transport).await?;
//!
//! for pipeline in client.active_pipelines_for(&audience) {
//!     // run it, then:
//!     client.publish_tail(&audience, &pipeline.id, before, after).await;
//! }
//! ```

mod client;
mod error;
mod schema;
mod session;

pub use client::{Client, ClientOptions, DEFAULT_RECONNECT_INTERVAL};
pub use error::{ClientError, Result};
pub use schema::SchemaCache;
pub use session::{SessionManager, SessionState};

pub use tether_tap::validate;
