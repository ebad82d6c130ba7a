//! Schema cache
//!
//! Remembers the last schema inferred for each audience and publishes a new
//! one to the coordinator whenever it changes. Publishing happens on a
//! detached task on the runtime the cache was created in, so step output can
//! be reported from any thread. Failures are logged and not retried.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tether_protocol::{Audience, AudienceKey, PipelineStep, SchemaUpdate, StepResult};
use tether_transport::Transport;
use tokio::runtime::Handle;
use tracing::{debug, error};

/// Last known schema per audience
pub struct SchemaCache {
    schemas: RwLock<HashMap<AudienceKey, Bytes>>,
    transport: Arc<dyn Transport>,
    runtime: Handle,
}

impl SchemaCache {
    /// Create an empty cache publishing through `transport`
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_runtime(transport, Handle::current())
    }

    /// Create an empty cache that spawns publishes on `runtime`
    pub fn with_runtime(transport: Arc<dyn Transport>, runtime: Handle) -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
            transport,
            runtime,
        }
    }

    /// Cached schema for an audience, empty if none
    pub fn get(&self, audience: &Audience) -> Bytes {
        self.schemas
            .read()
            .get(&audience.key())
            .cloned()
            .unwrap_or_default()
    }

    /// Handle the output of a pipeline step
    ///
    /// Only successful schema-inference steps are considered. Returns `true`
    /// if the schema changed and a publish was dispatched. Safe to call from
    /// threads outside the runtime.
    pub fn on_pipeline_output(
        &self,
        audience: &Audience,
        step: &PipelineStep,
        result: &StepResult,
    ) -> bool {
        if !step.infers_schema() || !result.is_success() {
            return false;
        }

        if !self.update(audience, &result.output) {
            return false;
        }

        let transport = Arc::clone(&self.transport);
        let update = SchemaUpdate::new(audience.clone(), result.output.clone());
        self.runtime.spawn(async move {
            match transport.send_schema(&update).await {
                Ok(()) => debug!(audience = %update.audience, "published schema"),
                Err(e) => error!(audience = %update.audience, error = %e, "failed to send schema"),
            }
        });

        true
    }

    /// Store `schema` if it differs from the cached value
    ///
    /// Compare and store happen under one lock, so concurrent callers with
    /// the same bytes publish at most once.
    fn update(&self, audience: &Audience, schema: &Bytes) -> bool {
        let mut schemas = self.schemas.write();
        let key = audience.key();

        // No entry compares equal to an empty schema
        let current = schemas.get(&key).map_or(&[][..], |s| &s[..]);
        if current == &schema[..] {
            return false;
        }

        schemas.insert(key, schema.clone());
        true
    }
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod tests;
