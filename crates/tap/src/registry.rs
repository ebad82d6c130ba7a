//! Tail session registry
//!
//! Holds every active tail, keyed by (audience, pipeline id) and then by tail
//! id, so one pipeline can be tailed several times at once.
//!
//! # Usage
//!
//! ```ignore
//! let registry = Arc::new(TailRegistry::new(store, transport, session_id, shutdown, TailConfig::default()));
//! registry.spawn_maintenance();
//!
//! // From the session manager:
//! registry.start(&command)?;
//!
//! // From the pipeline engine, after running a pipeline:
//! registry.publish(&audience, "p1", original, transformed).await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use parking_lot::RwLock;
use tether_pipeline::PipelineStore;
use tether_protocol::{Audience, AudienceKey, Command, TailRecord, TailResponseType};
use tether_transport::Transport;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Result, TapError};
use crate::session::TailSession;
use crate::validate::{validate_tail_start, validate_tail_stop};
use crate::worker::TailWorker;

/// Default outbound buffer capacity per session
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Default number of workers per session
pub const DEFAULT_WORKERS: usize = 2;

/// Default backoff after a refused stream open or send
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Default interval for reaping dead sessions
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(5);

/// Tail registry configuration
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// Outbound buffer capacity per session
    pub buffer_size: usize,
    /// Workers (and tail streams) per session
    pub workers: usize,
    /// Backoff after a refused stream open or send
    pub reconnect_interval: Duration,
    /// Interval for reaping dead sessions
    pub reap_interval: Duration,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            workers: DEFAULT_WORKERS,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }
}

impl TailConfig {
    /// Set buffer size
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set number of workers per session
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set backoff after a refused send
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set reap interval
    #[must_use]
    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(TapError::InvalidConfig("buffer_size must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(TapError::InvalidConfig("workers must be at least 1".into()));
        }
        Ok(())
    }
}

/// Sessions for one (audience, pipeline), by tail id
type SessionMap = HashMap<String, Arc<TailSession>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TailKey {
    audience: AudienceKey,
    pipeline_id: String,
}

impl TailKey {
    fn new(audience: &Audience, pipeline_id: &str) -> Self {
        Self {
            audience: audience.key(),
            pipeline_id: pipeline_id.to_string(),
        }
    }
}

/// Registry of active tail sessions
pub struct TailRegistry {
    /// Sessions by (audience, pipeline) then tail id
    sessions: RwLock<HashMap<TailKey, SessionMap>>,
    /// Consulted on start: only active pipelines can be tailed
    store: Arc<PipelineStore>,
    /// Opens worker streams
    transport: Arc<dyn Transport>,
    /// Client session id stamped on every record
    session_id: String,
    /// Parent of every session token
    shutdown: CancellationToken,
    config: TailConfig,
}

impl TailRegistry {
    /// Create a registry
    ///
    /// Session tokens are children of `shutdown`, so cancelling it stops
    /// every tail.
    pub fn new(
        store: Arc<PipelineStore>,
        transport: Arc<dyn Transport>,
        session_id: impl Into<String>,
        shutdown: CancellationToken,
        config: TailConfig,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
            transport,
            session_id: session_id.into(),
            shutdown,
            config,
        }
    }

    /// Start a tail from a TailStart command
    ///
    /// A tail on a pipeline that is not active is ignored. Starting a tail id
    /// that is already registered replaces (and stops) the old session.
    ///
    /// Returns without waiting on the network: each worker opens its own
    /// stream once spawned. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `TapError::InvalidCommand` if the command is malformed. No
    /// session is registered in that case.
    pub fn start(&self, command: &Command) -> Result<()> {
        let request = validate_tail_start(command)?;
        let audience = &request.audience;
        let pipeline_id = request.pipeline_id.as_str();
        let tail_id = request.id.as_str();

        if !self.store.is_active(audience, pipeline_id) {
            debug!(
                audience = %audience,
                pipeline_id,
                tail_id,
                "tail start for unknown pipeline, ignoring"
            );
            return Ok(());
        }

        let cancel = self.shutdown.child_token();
        let (tx, rx) = crossfire::mpmc::bounded_async(self.config.buffer_size);

        for worker_id in 0..self.config.workers {
            let worker = TailWorker {
                worker_id,
                tail_id: tail_id.to_string(),
                rx: rx.clone(),
                transport: Arc::clone(&self.transport),
                session_id: self.session_id.clone(),
                cancel: cancel.clone(),
                backoff: self.config.reconnect_interval,
            };
            tokio::spawn(worker.run());
        }

        let session = Arc::new(TailSession::new(
            tail_id.to_string(),
            audience.clone(),
            pipeline_id.to_string(),
            tx,
            cancel,
        ));

        let previous = self
            .sessions
            .write()
            .entry(TailKey::new(audience, pipeline_id))
            .or_default()
            .insert(tail_id.to_string(), session);

        if let Some(previous) = previous {
            previous.cancel();
            debug!(audience = %audience, pipeline_id, tail_id, "replaced existing tail session");
        }

        info!(
            audience = %audience,
            pipeline_id,
            tail_id,
            workers = self.config.workers,
            "tail started"
        );
        Ok(())
    }

    /// Stop a tail from a TailStop command
    ///
    /// Stopping an unknown tail is not an error.
    pub fn stop(&self, command: &Command) -> Result<()> {
        let request = validate_tail_stop(command)?;
        let audience = &request.audience;
        let pipeline_id = request.pipeline_id.as_str();
        let tail_id = request.id.as_str();

        let removed = {
            let mut sessions = self.sessions.write();
            let key = TailKey::new(audience, pipeline_id);
            let removed = sessions.get_mut(&key).and_then(|tails| tails.remove(tail_id));
            if sessions.get(&key).is_some_and(HashMap::is_empty) {
                sessions.remove(&key);
            }
            removed
        };

        match removed {
            Some(session) => {
                session.cancel();
                info!(audience = %audience, pipeline_id, tail_id, "tail stopped");
            }
            None => {
                debug!(audience = %audience, pipeline_id, tail_id, "stop for unknown tail, ignoring");
            }
        }

        Ok(())
    }

    /// Fan a before/after payload pair out to every tail on the pipeline
    ///
    /// Waits for buffer space when a session's buffer is full. Sessions that
    /// are found cancelled are skipped and pruned. Returns the number of
    /// sessions the record was enqueued on.
    pub async fn publish(
        &self,
        audience: &Audience,
        pipeline_id: &str,
        original_data: Bytes,
        new_data: Bytes,
    ) -> usize {
        let key = TailKey::new(audience, pipeline_id);

        // Snapshot so no lock is held while waiting on a full buffer
        let sessions: Vec<Arc<TailSession>> = match self.sessions.read().get(&key) {
            Some(tails) => tails.values().cloned().collect(),
            None => return 0,
        };

        let timestamp_ns = now_ns();
        let mut enqueued = 0;
        let mut found_dead = false;

        for session in sessions {
            let record = TailRecord {
                response_type: TailResponseType::Payload,
                tail_request_id: session.id().to_string(),
                audience: audience.clone(),
                pipeline_id: pipeline_id.to_string(),
                session_id: self.session_id.clone(),
                timestamp_ns,
                original_data: original_data.clone(),
                new_data: new_data.clone(),
            };

            if session.enqueue(record).await {
                enqueued += 1;
            } else {
                found_dead = true;
            }
        }

        if found_dead {
            self.prune(&key);
        }

        enqueued
    }

    /// Remove every cancelled session
    ///
    /// Called periodically by the maintenance task.
    pub fn reap(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before: usize = sessions.values().map(HashMap::len).sum();

        sessions.retain(|_, tails| {
            tails.retain(|_, session| !session.is_cancelled());
            !tails.is_empty()
        });

        let removed = before - sessions.values().map(HashMap::len).sum::<usize>();
        if removed > 0 {
            debug!(removed, "reaped dead tail sessions");
        }
        removed
    }

    /// Stop every session
    pub fn stop_all(&self) {
        let drained: Vec<SessionMap> = self.sessions.write().drain().map(|(_, v)| v).collect();
        for session in drained.iter().flat_map(HashMap::values) {
            session.cancel();
        }
    }

    /// Number of registered sessions
    pub fn session_count(&self) -> usize {
        self.sessions.read().values().map(HashMap::len).sum()
    }

    /// Whether a session is registered for (audience, pipeline, tail id)
    pub fn has_session(&self, audience: &Audience, pipeline_id: &str, tail_id: &str) -> bool {
        self.sessions
            .read()
            .get(&TailKey::new(audience, pipeline_id))
            .is_some_and(|tails| tails.contains_key(tail_id))
    }

    /// Whether any session is tailing the pipeline
    #[inline]
    pub fn is_tailed(&self, audience: &Audience, pipeline_id: &str) -> bool {
        self.sessions
            .read()
            .contains_key(&TailKey::new(audience, pipeline_id))
    }

    /// Spawn the maintenance task
    ///
    /// Reaps dead sessions every `reap_interval` until shutdown.
    pub fn spawn_maintenance(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            let mut reap_interval = tokio::time::interval(registry.config.reap_interval);

            loop {
                tokio::select! {
                    _ = registry.shutdown.cancelled() => {
                        registry.stop_all();
                        return;
                    }
                    _ = reap_interval.tick() => {
                        registry.reap();
                    }
                }
            }
        })
    }

    fn prune(&self, key: &TailKey) {
        let mut sessions = self.sessions.write();
        if let Some(tails) = sessions.get_mut(key) {
            tails.retain(|_, session| !session.is_cancelled());
            if tails.is_empty() {
                sessions.remove(key);
            }
        }
    }
}

impl std::fmt::Debug for TailRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailRegistry")
            .field("session_id", &self.session_id)
            .field("sessions", &self.session_count())
            .field("config", &self.config)
            .finish()
    }
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as i64)
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
