//! Tail worker
//!
//! Drains a session's buffer onto one tail stream. Each session runs a small
//! pool of these; any of them may take the next record.
//!
//! ```text
//!              ┌──► worker 0 ──► tail stream 0 ──┐
//! publish ──► buffer                             ├──► coordinator
//!              └──► worker 1 ──► tail stream 1 ──┘
//! ```
//!
//! Each worker opens its own stream when it starts, so starting a tail never
//! waits on the network. A refused open backs off and retries; any other open
//! failure ends the worker.
//!
//! Send failures:
//! - end of stream: the coordinator closed the stream, exit quietly
//! - connection refused: back off and keep looping
//! - anything else: log, drop the record, keep looping
//!
//! Whatever the exit path, the worker cancels the session token on the way
//! out so the registry can reap the session.

use std::sync::Arc;
use std::time::Duration;

use crossfire::MAsyncRx;
use tether_protocol::TailRecord;
use tether_transport::{TailStream, Transport};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub(crate) struct TailWorker {
    /// Index within the session's pool
    pub(crate) worker_id: usize,
    /// Tail id, for logs
    pub(crate) tail_id: String,
    /// Consumer side of the session buffer
    pub(crate) rx: MAsyncRx<TailRecord>,
    /// Opens this worker's stream
    pub(crate) transport: Arc<dyn Transport>,
    /// Client session id sent when opening the stream
    pub(crate) session_id: String,
    /// Session token
    pub(crate) cancel: CancellationToken,
    /// Sleep after a refused open or send
    pub(crate) backoff: Duration,
}

impl TailWorker {
    pub(crate) async fn run(self) {
        let _guard = self.cancel.clone().drop_guard();

        let Some(mut stream) = self.open().await else {
            return;
        };

        let Self {
            worker_id,
            tail_id,
            rx,
            cancel,
            backoff,
            ..
        } = self;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(tail_id, worker_id, "tail worker cancelled");
                    return;
                }
                _ = stream.closed() => {
                    debug!(tail_id, worker_id, "tail stream terminated");
                    return;
                }
                record = rx.recv() => {
                    let Ok(record) = record else {
                        debug!(tail_id, worker_id, "tail buffer closed");
                        return;
                    };

                    let Err(e) = stream.send(record).await else {
                        continue;
                    };

                    if e.is_end_of_stream() {
                        debug!(tail_id, worker_id, "tail stream received end of stream, exiting");
                        return;
                    }

                    if e.is_connection_refused() {
                        warn!(
                            tail_id,
                            worker_id,
                            error = %e,
                            "coordinator went away, waiting before retrying"
                        );
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            _ = tokio::time::sleep(backoff) => {}
                        }
                        continue;
                    }

                    error!(tail_id, worker_id, error = %e, "failed to send tail record");
                }
            }
        }
    }

    /// Open the tail stream, retrying refused opens until cancelled
    async fn open(&self) -> Option<Box<dyn TailStream>> {
        let (worker_id, tail_id) = (self.worker_id, self.tail_id.as_str());

        loop {
            let opened = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                opened = self.transport.open_tail_stream(&self.session_id) => opened,
            };

            match opened {
                Ok(stream) => {
                    debug!(tail_id, worker_id, "tail stream opened");
                    return Some(stream);
                }
                Err(e) if e.is_connection_refused() => {
                    warn!(
                        tail_id,
                        worker_id,
                        error = %e,
                        retry_in = ?self.backoff,
                        "unable to open tail stream, retrying"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return None,
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                }
                Err(e) => {
                    error!(tail_id, worker_id, error = %e, "unable to open tail stream");
                    return None;
                }
            }
        }
    }
}
