//! In-memory transport
//!
//! A transport that never leaves the process. Control streams are scripted
//! from the outside through [`ControlHandle`]s; everything sent by the client
//! (registrations, tail records, schema updates) is recorded and can be
//! inspected or awaited.
//!
//! # Example
//!
//! ```ignore
//! let transport = MemoryTransport::new();
//! let control = transport.push_control_stream();
//!
//! // hand `transport.clone()` to the client, then drive it
//! control.send(Command::attach(audience, pipeline));
//! control.close(); // client sees end of stream and reconnects
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tether_protocol::{Command, RegisterRequest, SchemaUpdate, TailRecord};
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

use crate::{ControlStream, Result, StreamError, TailStream, Transport};

/// How tail streams respond to `send`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendBehavior {
    /// Record the record
    #[default]
    Deliver,
    /// Fail with `StreamError::EndOfStream`
    EndOfStream,
    /// Fail with `StreamError::ConnectionRefused`
    ConnectionRefused,
    /// Fail with `StreamError::Transient`
    Fail,
    /// Wait until the behavior changes, then act on the new one
    Hold,
}

/// A record delivered on a tail stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    /// Index of the tail stream, in open order
    pub stream: usize,
    /// The record
    pub record: TailRecord,
}

/// Outcome of the next `open_control_stream` call
enum ControlScript {
    Stream(mpsc::UnboundedReceiver<Result<Command>>),
    Error(StreamError),
}

#[derive(Default)]
struct Inner {
    control: Mutex<VecDeque<ControlScript>>,
    control_opens: AtomicUsize,
    registrations: Mutex<Vec<RegisterRequest>>,

    tail_streams_opened: AtomicUsize,
    refuse_tail_streams: AtomicBool,
    hold_tail_streams: AtomicBool,
    send_behavior: Mutex<SendBehavior>,
    hang_up: Mutex<CancellationToken>,
    records: Mutex<Vec<SentRecord>>,

    schemas: Mutex<Vec<SchemaUpdate>>,
    fail_schemas: AtomicBool,

    changed: Notify,
}

/// Scripted in-process transport
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

/// Feeds commands into one scripted control stream
///
/// Dropping the handle (or calling [`close`](Self::close)) ends the stream.
#[derive(Debug)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<Result<Command>>,
}

impl ControlHandle {
    /// Deliver a command. Returns `false` once the client dropped the stream.
    pub fn send(&self, command: Command) -> bool {
        self.tx.send(Ok(command)).is_ok()
    }

    /// Deliver a receive error
    pub fn fail(&self, err: StreamError) -> bool {
        self.tx.send(Err(err)).is_ok()
    }

    /// End the stream
    pub fn close(self) {}

    /// Whether the client has dropped the stream
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl MemoryTransport {
    /// Create a transport with nothing scripted
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next control stream open to succeed
    ///
    /// Opens consume scripts in push order. With nothing scripted, opening
    /// fails with `ConnectionRefused`.
    pub fn push_control_stream(&self) -> ControlHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .control
            .lock()
            .push_back(ControlScript::Stream(rx));
        ControlHandle { tx }
    }

    /// Script the next control stream open to fail
    pub fn push_control_error(&self, err: StreamError) {
        self.inner
            .control
            .lock()
            .push_back(ControlScript::Error(err));
    }

    /// Number of control stream open attempts
    pub fn control_opens(&self) -> usize {
        self.inner.control_opens.load(Ordering::Relaxed)
    }

    /// Registration requests received, one per successful open
    pub fn registrations(&self) -> Vec<RegisterRequest> {
        self.inner.registrations.lock().clone()
    }

    /// Number of tail streams opened
    pub fn tail_streams_opened(&self) -> usize {
        self.inner.tail_streams_opened.load(Ordering::Relaxed)
    }

    /// Make tail stream opens fail with `ConnectionRefused`
    pub fn refuse_tail_streams(&self, refuse: bool) {
        self.inner.refuse_tail_streams.store(refuse, Ordering::Relaxed);
    }

    /// Make tail stream opens wait until released
    pub fn hold_tail_streams(&self, hold: bool) {
        self.inner.hold_tail_streams.store(hold, Ordering::Relaxed);
        self.inner.changed.notify_waiters();
    }

    /// Set how tail streams respond to `send`
    pub fn set_send_behavior(&self, behavior: SendBehavior) {
        *self.inner.send_behavior.lock() = behavior;
        self.inner.changed.notify_waiters();
    }

    /// Terminate every tail stream opened so far
    pub fn hang_up_tail_streams(&self) {
        let old = std::mem::take(&mut *self.inner.hang_up.lock());
        old.cancel();
        self.inner.changed.notify_waiters();
    }

    /// Records delivered on tail streams
    pub fn sent_records(&self) -> Vec<SentRecord> {
        self.inner.records.lock().clone()
    }

    /// Schema updates received
    pub fn schemas(&self) -> Vec<SchemaUpdate> {
        self.inner.schemas.lock().clone()
    }

    /// Make schema publishes fail
    pub fn fail_schema_publish(&self, fail: bool) {
        self.inner.fail_schemas.store(fail, Ordering::Relaxed);
    }

    /// Wait until `condition` holds
    ///
    /// Re-evaluated every time the transport records something.
    pub async fn wait_for<F>(&self, condition: F)
    where
        F: Fn(&MemoryTransport) -> bool,
    {
        loop {
            let notified = self.inner.changed.notified();
            if condition(self) {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open_control_stream(
        &self,
        request: &RegisterRequest,
    ) -> Result<Box<dyn ControlStream>> {
        self.inner.control_opens.fetch_add(1, Ordering::Relaxed);
        let script = self.inner.control.lock().pop_front();

        let result = match script {
            Some(ControlScript::Stream(rx)) => {
                self.inner.registrations.lock().push(request.clone());
                Ok(Box::new(MemoryControlStream { rx }) as Box<dyn ControlStream>)
            }
            Some(ControlScript::Error(err)) => Err(err),
            None => Err(StreamError::ConnectionRefused(
                "no control stream scripted".into(),
            )),
        };

        self.inner.changed.notify_waiters();
        result
    }

    async fn open_tail_stream(&self, _session_id: &str) -> Result<Box<dyn TailStream>> {
        loop {
            let notified = self.inner.changed.notified();
            if !self.inner.hold_tail_streams.load(Ordering::Relaxed) {
                break;
            }
            notified.await;
        }

        if self.inner.refuse_tail_streams.load(Ordering::Relaxed) {
            return Err(StreamError::ConnectionRefused("tail streams refused".into()));
        }

        let index = self.inner.tail_streams_opened.fetch_add(1, Ordering::Relaxed);
        let hang_up = self.inner.hang_up.lock().clone();
        self.inner.changed.notify_waiters();

        Ok(Box::new(MemoryTailStream {
            index,
            inner: Arc::clone(&self.inner),
            hang_up,
        }))
    }

    async fn send_schema(&self, update: &SchemaUpdate) -> Result<()> {
        if self.inner.fail_schemas.load(Ordering::Relaxed) {
            return Err(StreamError::Transient("schema publish rejected".into()));
        }

        self.inner.schemas.lock().push(update.clone());
        self.inner.changed.notify_waiters();
        Ok(())
    }
}

struct MemoryControlStream {
    rx: mpsc::UnboundedReceiver<Result<Command>>,
}

#[async_trait]
impl ControlStream for MemoryControlStream {
    async fn recv(&mut self) -> Result<Command> {
        match self.rx.recv().await {
            Some(result) => result,
            None => Err(StreamError::EndOfStream),
        }
    }
}

struct MemoryTailStream {
    index: usize,
    inner: Arc<Inner>,
    hang_up: CancellationToken,
}

#[async_trait]
impl TailStream for MemoryTailStream {
    async fn send(&mut self, record: TailRecord) -> Result<()> {
        loop {
            let notified = self.inner.changed.notified();
            let behavior = *self.inner.send_behavior.lock();

            return match behavior {
                SendBehavior::Hold => {
                    notified.await;
                    continue;
                }
                SendBehavior::Deliver => {
                    self.inner.records.lock().push(SentRecord {
                        stream: self.index,
                        record,
                    });
                    self.inner.changed.notify_waiters();
                    Ok(())
                }
                SendBehavior::EndOfStream => Err(StreamError::EndOfStream),
                SendBehavior::ConnectionRefused => {
                    Err(StreamError::ConnectionRefused("scripted refusal".into()))
                }
                SendBehavior::Fail => Err(StreamError::Transient("scripted send failure".into())),
            };
        }
    }

    async fn closed(&mut self) {
        self.hang_up.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tether_protocol::{Audience, OperationType, Pipeline};
    use tokio::time::timeout;

    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            service_name: "billing".into(),
            session_id: "s1".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_scripted_control_streams_in_order() {
        let transport = MemoryTransport::new();
        transport.push_control_error(StreamError::Transient("boom".into()));
        let handle = transport.push_control_stream();

        let err = transport.open_control_stream(&request()).await.err().unwrap();
        assert!(matches!(err, StreamError::Transient(_)));

        let mut stream = transport.open_control_stream(&request()).await.unwrap();
        let aud = Audience::new("billing", "kafka", OperationType::Producer, "orders");
        assert!(handle.send(Command::attach(aud.clone(), Pipeline::new("p1", "x"))));
        assert_eq!(
            stream.recv().await.unwrap(),
            Command::attach(aud, Pipeline::new("p1", "x"))
        );

        handle.close();
        assert!(stream.recv().await.unwrap_err().is_end_of_stream());

        assert_eq!(transport.control_opens(), 2);
        assert_eq!(transport.registrations(), vec![request()]);
    }

    #[tokio::test]
    async fn test_unscripted_open_is_refused() {
        let transport = MemoryTransport::new();
        let err = transport.open_control_stream(&request()).await.err().unwrap();
        assert!(err.is_connection_refused());
    }

    #[tokio::test]
    async fn test_hang_up_resolves_closed() {
        let transport = MemoryTransport::new();
        let mut first = transport.open_tail_stream("s1").await.unwrap();

        transport.hang_up_tail_streams();
        timeout(Duration::from_secs(1), first.closed()).await.unwrap();

        // streams opened afterwards are unaffected
        let mut second = transport.open_tail_stream("s1").await.unwrap();
        assert!(
            timeout(Duration::from_millis(50), second.closed())
                .await
                .is_err()
        );
        assert_eq!(transport.tail_streams_opened(), 2);
    }

    #[tokio::test]
    async fn test_wait_for_schema() {
        let transport = MemoryTransport::new();
        let waiter = {
            let transport = transport.clone();
            tokio::spawn(async move {
                transport.wait_for(|t| !t.schemas().is_empty()).await;
            })
        };

        let aud = Audience::new("billing", "kafka", OperationType::Producer, "orders");
        transport
            .send_schema(&SchemaUpdate::new(aud, &b"{}"[..]))
            .await
            .unwrap();

        timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_held_tail_open_waits_for_release() {
        let transport = MemoryTransport::new();
        transport.hold_tail_streams(true);

        let opener = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.open_tail_stream("s1").await.is_ok() })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!opener.is_finished());
        assert_eq!(transport.tail_streams_opened(), 0);

        transport.hold_tail_streams(false);
        assert!(timeout(Duration::from_secs(1), opener).await.unwrap().unwrap());
        assert_eq!(transport.tail_streams_opened(), 1);
    }

    #[tokio::test]
    async fn test_held_send_delivers_after_release() {
        let transport = MemoryTransport::new();
        transport.set_send_behavior(SendBehavior::Hold);
        let mut stream = transport.open_tail_stream("s1").await.unwrap();

        let aud = Audience::new("billing", "kafka", OperationType::Producer, "orders");
        let record = TailRecord {
            response_type: tether_protocol::TailResponseType::Payload,
            tail_request_id: "t1".into(),
            audience: aud,
            pipeline_id: "p1".into(),
            session_id: "s1".into(),
            timestamp_ns: 1,
            original_data: bytes::Bytes::from_static(b"a"),
            new_data: bytes::Bytes::from_static(b"b"),
        };

        let sender = tokio::spawn(async move { stream.send(record).await.is_ok() });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!sender.is_finished());
        assert!(transport.sent_records().is_empty());

        transport.set_send_behavior(SendBehavior::Deliver);
        assert!(timeout(Duration::from_secs(1), sender).await.unwrap().unwrap());
        assert_eq!(transport.sent_records().len(), 1);
    }
}
