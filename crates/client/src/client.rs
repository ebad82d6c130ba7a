//! Client facade
//!
//! Wires the pieces together and exposes what the pipeline engine needs:
//! which pipelines to run, where to send tail data, and where to report
//! step output for schema tracking.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tether_pipeline::PipelineStore;
use tether_protocol::{
    Audience, ClientInfo, ClientType, Pipeline, PipelineStep, RegisterRequest, StepResult,
};
use tether_tap::{TailConfig, TailRegistry};
use tether_transport::Transport;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::schema::SchemaCache;
use crate::session::{SessionManager, SessionState};

/// Default backoff for every reconnect path
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Options for starting a client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Local service identity
    pub service_name: String,
    /// How the client is embedded
    pub client_type: ClientType,
    /// Run pipelines without applying results
    pub dry_run: bool,
    /// Audiences announced at registration
    pub audiences: Vec<Audience>,
    /// Backoff for every reconnect path
    pub reconnect_interval: Duration,
    /// Tail registry settings
    pub tail: TailConfig,
}

impl ClientOptions {
    /// Options for a service with defaults for everything else
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            client_type: ClientType::Sdk,
            dry_run: false,
            audiences: Vec::new(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            tail: TailConfig::default(),
        }
    }

    /// Set client type
    #[must_use]
    pub fn with_client_type(mut self, client_type: ClientType) -> Self {
        self.client_type = client_type;
        self
    }

    /// Enable or disable dry run
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Add an audience to announce at registration
    #[must_use]
    pub fn with_audience(mut self, audience: Audience) -> Self {
        self.audiences.push(audience);
        self
    }

    /// Set reconnect interval
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set tail registry settings
    #[must_use]
    pub fn with_tail_config(mut self, tail: TailConfig) -> Self {
        self.tail = tail;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.service_name.is_empty() {
            return Err(ClientError::InvalidConfig(
                "service_name cannot be empty".into(),
            ));
        }
        if self.reconnect_interval.is_zero() {
            return Err(ClientError::InvalidConfig(
                "reconnect_interval must be greater than zero".into(),
            ));
        }
        self.tail
            .validate()
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))
    }

    fn register_request(&self, session_id: &str) -> RegisterRequest {
        RegisterRequest {
            service_name: self.service_name.clone(),
            session_id: session_id.to_string(),
            client_info: ClientInfo::current(self.client_type),
            audiences: self.audiences.clone(),
            dry_run: self.dry_run,
        }
    }
}

/// A running control-plane client
///
/// Dropping the client requests shutdown; call [`join`](Self::join) to wait
/// for its tasks to finish.
pub struct Client {
    session_id: String,
    store: Arc<PipelineStore>,
    tails: Arc<TailRegistry>,
    schemas: SchemaCache,
    shutdown: CancellationToken,
    state: watch::Receiver<SessionState>,
    session_task: Option<JoinHandle<()>>,
    maintenance_task: Option<JoinHandle<()>>,
}

impl Client {
    /// Register with the coordinator and start the session loop
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidConfig` for unusable options and
    /// `ClientError::Registration` if the control stream cannot be opened.
    pub async fn start(options: ClientOptions, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::start_with_shutdown(options, transport, CancellationToken::new()).await
    }

    /// Like [`start`](Self::start), stopping when `shutdown` is cancelled
    ///
    /// If `shutdown` fires during registration the client is returned
    /// without a session loop.
    pub async fn start_with_shutdown(
        options: ClientOptions,
        transport: Arc<dyn Transport>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        options.validate()?;

        let session_id = Uuid::new_v4().to_string();
        let store = Arc::new(PipelineStore::new());
        let tails = Arc::new(TailRegistry::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            session_id.clone(),
            shutdown.clone(),
            options.tail.clone(),
        ));
        let schemas = SchemaCache::new(Arc::clone(&transport));

        let manager = SessionManager::new(
            options.register_request(&session_id),
            transport,
            Arc::clone(&store),
            Arc::clone(&tails),
            options.reconnect_interval,
            shutdown.clone(),
        );
        let state = manager.subscribe();

        let stream = manager.register().await?;
        let maintenance_task = Some(tails.spawn_maintenance());
        let session_task = stream.map(|stream| tokio::spawn(manager.run(stream)));

        info!(
            service = %options.service_name,
            session_id,
            dry_run = options.dry_run,
            "client started"
        );

        Ok(Self {
            session_id,
            store,
            tails,
            schemas,
            shutdown,
            state,
            session_task,
            maintenance_task,
        })
    }

    /// Per-process session id
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Pipelines to run for an audience, in attach order
    pub fn active_pipelines_for(&self, audience: &Audience) -> Vec<Arc<Pipeline>> {
        self.store.active_pipelines_for(audience)
    }

    /// Paused pipelines for an audience
    pub fn paused_pipelines_for(&self, audience: &Audience) -> Vec<Arc<Pipeline>> {
        self.store.paused_pipelines_for(audience)
    }

    /// Send a before/after payload pair to every tail on the pipeline
    ///
    /// Waits while a tail's buffer is full. Never call this while holding
    /// anything the control loop might need.
    pub async fn publish_tail(
        &self,
        audience: &Audience,
        pipeline_id: &str,
        original_data: impl Into<Bytes>,
        new_data: impl Into<Bytes>,
    ) -> usize {
        self.tails
            .publish(audience, pipeline_id, original_data.into(), new_data.into())
            .await
    }

    /// Report a step result for schema tracking
    ///
    /// Returns `true` if a new schema was published.
    pub fn notify_schema_output(
        &self,
        audience: &Audience,
        step: &PipelineStep,
        result: &StepResult,
    ) -> bool {
        self.schemas.on_pipeline_output(audience, step, result)
    }

    /// Last schema published for an audience
    pub fn schema(&self, audience: &Audience) -> Bytes {
        self.schemas.get(audience)
    }

    /// Tail registry
    pub fn tails(&self) -> &TailRegistry {
        &self.tails
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch session state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Request shutdown of the session loop and every tail
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether shutdown has been requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Wait for the session loop and maintenance task to finish
    ///
    /// Only returns after [`shutdown`](Self::shutdown). A task that panicked
    /// is logged.
    pub async fn join(mut self) {
        for (name, task) in [
            ("session", self.session_task.take()),
            ("maintenance", self.maintenance_task.take()),
        ] {
            let Some(task) = task else { continue };
            if let Err(e) = task.await {
                error!(task = name, error = %e, "client task failed");
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
