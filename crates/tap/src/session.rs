//! Tail session
//!
//! One active tail: the bounded outbound buffer that `publish` fills and the
//! workers drain, plus the token that stops those workers.

use std::fmt;

use crossfire::MAsyncTx;
use tether_protocol::{Audience, TailRecord};
use tokio_util::sync::CancellationToken;

/// An active tail on one pipeline
pub struct TailSession {
    /// Tail id from the start request
    id: String,
    /// Tailed audience
    audience: Audience,
    /// Tailed pipeline
    pipeline_id: String,
    /// Producer side of the outbound buffer
    tx: MAsyncTx<TailRecord>,
    /// Stops every worker of this session
    cancel: CancellationToken,
}

impl TailSession {
    pub(crate) fn new(
        id: String,
        audience: Audience,
        pipeline_id: String,
        tx: MAsyncTx<TailRecord>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            audience,
            pipeline_id,
            tx,
            cancel,
        }
    }

    /// Tail id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tailed audience
    pub fn audience(&self) -> &Audience {
        &self.audience
    }

    /// Tailed pipeline id
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Whether the session has been stopped or lost its workers
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the session's workers
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Enqueue a record, waiting for buffer space
    ///
    /// Returns `false` if the session was cancelled before the record could
    /// be enqueued.
    pub(crate) async fn enqueue(&self, record: TailRecord) -> bool {
        if self.is_cancelled() {
            return false;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            result = self.tx.send(record) => result.is_ok(),
        }
    }
}

impl fmt::Debug for TailSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TailSession")
            .field("id", &self.id)
            .field("audience", &self.audience)
            .field("pipeline_id", &self.pipeline_id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
