//! Session manager
//!
//! Owns the control stream: registers with the coordinator, dispatches every
//! inbound command, and reconnects when the stream goes away.
//!
//! # States
//!
//! ```text
//!             open ok
//! Connecting ────────► Streaming ◄──────────────┐
//!     │                  │    │                 │ reopen ok
//!     │ open failed      │    │ end of stream   │
//!     ▼                  │    └──────► Reconnecting ──┐
//!   fatal                │                 ▲          │ reopen failed:
//!                        │                 └──────────┘ back off, retry
//!                        │ shutdown (from any state)
//!                        ▼
//!                   ShuttingDown
//! ```
//!
//! Any other receive error keeps the current stream and retries after the
//! same fixed backoff.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tether_pipeline::{PipelineError, PipelineStore};
use tether_protocol::{Command, CommandKind, RegisterRequest};
use tether_tap::TailRegistry;
use tether_transport::{ControlStream, StreamError, Transport};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, Result};

/// Session manager state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Opening the control stream for the first time
    Connecting,
    /// Receiving commands
    Streaming,
    /// Control stream lost, waiting to reopen it
    Reconnecting,
    /// Deliberate shutdown, loop exited or exiting
    ShuttingDown,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Reconnecting => "reconnecting",
            Self::ShuttingDown => "shutting_down",
        };
        f.write_str(s)
    }
}

/// How a streaming run ended
enum StreamEnd {
    EndOfStream,
    Shutdown,
}

/// Drives the control stream
pub struct SessionManager {
    /// Local service identity; commands for other services are dropped
    service_name: String,
    /// Handshake sent on every (re)open
    request: RegisterRequest,
    transport: Arc<dyn Transport>,
    store: Arc<PipelineStore>,
    tails: Arc<TailRegistry>,
    /// Single backoff for every retry path
    reconnect_interval: Duration,
    shutdown: CancellationToken,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    /// Create a session manager
    pub fn new(
        request: RegisterRequest,
        transport: Arc<dyn Transport>,
        store: Arc<PipelineStore>,
        tails: Arc<TailRegistry>,
        reconnect_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            service_name: request.service_name.clone(),
            request,
            transport,
            store,
            tails,
            reconnect_interval,
            shutdown,
            state,
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Open the control stream for the first time
    ///
    /// Returns `Ok(None)` if shutdown was requested while connecting.
    ///
    /// # Errors
    ///
    /// Any other failure is fatal and returned as `ClientError::Registration`.
    pub async fn register(&self) -> Result<Option<Box<dyn ControlStream>>> {
        self.set_state(SessionState::Connecting);

        match self.open().await {
            Ok(stream) => {
                info!(
                    service = %self.service_name,
                    session_id = %self.request.session_id,
                    audiences = self.request.audiences.len(),
                    "registered with coordinator"
                );
                self.set_state(SessionState::Streaming);
                Ok(Some(stream))
            }
            Err(e) if e.is_cancelled() => {
                debug!("shutdown requested during registration");
                self.set_state(SessionState::ShuttingDown);
                Ok(None)
            }
            Err(e) => Err(ClientError::Registration(e)),
        }
    }

    /// Run the receive loop until shutdown
    pub async fn run(self, stream: Box<dyn ControlStream>) {
        let mut stream = stream;

        loop {
            if let StreamEnd::Shutdown = self.stream_commands(&mut stream).await {
                break;
            }

            drop(stream);
            self.set_state(SessionState::Reconnecting);

            match self.reconnect().await {
                Some(reopened) => stream = reopened,
                None => break,
            }
        }

        self.set_state(SessionState::ShuttingDown);
        debug!("session loop stopped");
    }

    /// Receive and dispatch until the stream ends or shutdown
    async fn stream_commands(&self, stream: &mut Box<dyn ControlStream>) -> StreamEnd {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return StreamEnd::Shutdown,
                received = stream.recv() => received,
            };

            match received {
                Ok(command) => {
                    tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => return StreamEnd::Shutdown,
                        _ = self.dispatch(command) => {}
                    }
                }
                Err(e) if e.is_cancelled() => {
                    debug!("control stream cancelled");
                    return StreamEnd::Shutdown;
                }
                Err(e) if e.is_end_of_stream() => {
                    warn!(
                        retry_in = ?self.reconnect_interval,
                        "coordinator is unavailable, reconnecting"
                    );
                    return StreamEnd::EndOfStream;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in = ?self.reconnect_interval,
                        "error receiving command, retrying"
                    );
                    if !self.backoff().await {
                        return StreamEnd::Shutdown;
                    }
                }
            }
        }
    }

    /// Reopen the control stream, retrying forever
    ///
    /// Returns `None` on shutdown.
    async fn reconnect(&self) -> Option<Box<dyn ControlStream>> {
        loop {
            if !self.backoff().await {
                return None;
            }

            match self.open().await {
                Ok(stream) => {
                    info!("reconnected to coordinator");
                    self.set_state(SessionState::Streaming);
                    return Some(stream);
                }
                Err(e) if e.is_cancelled() => {
                    debug!("shutdown requested during reconnect");
                    return None;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        retry_in = ?self.reconnect_interval,
                        "failed to reconnect to coordinator"
                    );
                }
            }
        }
    }

    /// Handle one command
    ///
    /// Failures are logged; nothing is reported back to the coordinator.
    pub async fn dispatch(&self, command: Command) {
        if command.is_keep_alive() {
            debug!("received keep alive");
            return;
        }

        if command.audience.service_name != self.service_name {
            debug!(
                service = %command.audience.service_name,
                command = command.kind_name(),
                "command for different service, ignoring"
            );
            return;
        }

        let audience = &command.audience;
        let result: Result<()> = match &command.kind {
            None => Err(PipelineError::EmptyCommand.into()),
            Some(CommandKind::KeepAlive) => Ok(()),
            Some(CommandKind::AttachPipeline(pipeline)) => {
                debug!(audience = %audience, pipeline_id = %pipeline.id, "received attach pipeline");
                self.store.attach(audience, pipeline.clone());
                Ok(())
            }
            Some(CommandKind::DetachPipeline { pipeline_id }) => {
                debug!(audience = %audience, pipeline_id, "received detach pipeline");
                self.store.detach(audience, pipeline_id);
                Ok(())
            }
            Some(CommandKind::PausePipeline { pipeline_id }) => {
                debug!(audience = %audience, pipeline_id, "received pause pipeline");
                self.store.pause(audience, pipeline_id).map_err(Into::into)
            }
            Some(CommandKind::ResumePipeline { pipeline_id }) => {
                debug!(audience = %audience, pipeline_id, "received resume pipeline");
                self.store.resume(audience, pipeline_id).map_err(Into::into)
            }
            Some(CommandKind::TailStart(_)) => self.tails.start(&command).map_err(Into::into),
            Some(CommandKind::TailStop(_)) => self.tails.stop(&command).map_err(Into::into),
        };

        if let Err(e) = result {
            error!(
                audience = %audience,
                command = command.kind_name(),
                error = %e,
                "failed to handle command"
            );
        }
    }

    async fn open(&self) -> std::result::Result<Box<dyn ControlStream>, StreamError> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(StreamError::Cancelled),
            opened = self.transport.open_control_stream(&self.request) => opened,
        }
    }

    /// Sleep the backoff interval; `false` if shutdown came first
    async fn backoff(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.reconnect_interval) => true,
        }
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
