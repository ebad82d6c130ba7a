//! Tether - Pipeline State
//!
//! Per-audience pipeline state as told by the control plane.
//!
//! # Architecture
//!
//! ```text
//! [Session Manager]                [PipelineStore]                 [Execution]
//!   Attach  ──┐               ┌── active: RwLock<map> ◄──── active_pipelines_for()
//!   Detach  ──┼──► store ─────┤        │  ▲
//!   Pause   ──┤               │  pause │  │ resume
//!   Resume  ──┘               └── paused: RwLock<map>
//! ```
//!
//! # Key Design
//!
//! - **Exclusive placement**: a pipeline is either active, paused, or absent
//! - **Atomic moves**: pause/resume hold both locks, `active` before `paused`
//! - **Snapshots**: lookups return `Arc<Pipeline>` clones, never lock guards
//! - **Attach order**: lookups return pipelines in the order they were attached
//!
//! # Example
//!
//! ```ignore
//! use tether_pipeline::PipelineStore;
//! use tether_protocol::{Audience, OperationType, Pipeline};
//!
//! let store = PipelineStore::new();
//! let audience = Audience::new("billing", "kafka", OperationType::Consumer, "orders");
//!
//! store.attach(&audience, Pipeline::new("p1", "mask-pii"));
//! store.pause(&audience, "p1")?;
//! assert!(store.active_pipelines_for(&audience).is_empty());
//! ```

mod error;
mod store;

pub use error::{PipelineError, Result};
pub use store::{PipelineState, PipelineStore};
