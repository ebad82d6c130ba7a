//! Tether Tap - On-demand tailing of pipeline payloads
//!
//! While a tail is active, every payload that runs through the tailed
//! pipeline is streamed back to the coordinator as a before/after pair.
//!
//! - Tails are started and stopped by coordinator commands
//! - Each tail has a bounded buffer drained by a small pool of workers, each
//!   with its own stream to the coordinator
//! - A full buffer makes `publish` wait rather than grow
//! - Dead sessions are pruned on publish and reaped by a maintenance task
//!
//! # Architecture
//!
//! ```text
//! Pipeline engine
//!     │
//!     └──→ TailRegistry.publish(audience, pipeline_id, before, after)
//!               │
//!          ┌────┴────┐            (one per tail id)
//!          ▼         ▼
//!      TailSession  TailSession ◄── bounded buffer + cancellation token
//!          │
//!     ┌────┴────┐
//!     ▼         ▼
//!  worker 0   worker 1 ──→ tail streams ──→ coordinator
//! ```

mod error;
mod registry;
mod session;
pub mod validate;
mod worker;

pub use error::{Result, TapError};
pub use registry::{
    DEFAULT_BUFFER_SIZE, DEFAULT_REAP_INTERVAL, DEFAULT_RECONNECT_INTERVAL, DEFAULT_WORKERS,
    TailConfig, TailRegistry,
};
pub use session::TailSession;
