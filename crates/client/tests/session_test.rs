//! End-to-end tests for the client
//!
//! Drive a full client through the in-memory transport the way a coordinator
//! would, and check what the pipeline engine sees.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tether_client::{Client, ClientError, ClientOptions, SessionState};
use tether_protocol::{
    Audience, ClientType, Command, OperationType, Pipeline, PipelineStep, StepKind, StepResult,
    TailRequest,
};
use tether_tap::TailConfig;
use tether_transport::StreamError;
use tether_transport::memory::{ControlHandle, MemoryTransport};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

fn orders() -> Audience {
    Audience::new("billing", "kafka", OperationType::Consumer, "orders")
}

fn options() -> ClientOptions {
    ClientOptions::new("billing")
        .with_client_type(ClientType::Shim)
        .with_audience(orders())
        .with_reconnect_interval(Duration::from_millis(10))
        .with_tail_config(TailConfig::default().with_reconnect_interval(Duration::from_millis(10)))
}

async fn start() -> (Client, MemoryTransport, ControlHandle) {
    let transport = MemoryTransport::new();
    let control = transport.push_control_stream();
    let client = Client::start(options(), Arc::new(transport.clone()))
        .await
        .expect("client should start");
    (client, transport, control)
}

async fn eventually<F: Fn() -> bool>(what: &str, condition: F) {
    let result = timeout(Duration::from_secs(2), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

fn active_ids(client: &Client) -> Vec<String> {
    client
        .active_pipelines_for(&orders())
        .iter()
        .map(|p| p.id.clone())
        .collect()
}

#[tokio::test]
async fn test_registration_handshake() {
    let (client, transport, _control) = start().await;

    let registrations = transport.registrations();
    assert_eq!(registrations.len(), 1);

    let request = &registrations[0];
    assert_eq!(request.service_name, "billing");
    assert_eq!(request.session_id, client.session_id());
    assert_eq!(request.client_info.client_type, ClientType::Shim);
    assert_eq!(request.client_info.library_name, "tether");
    assert_eq!(request.audiences, vec![orders()]);
    assert!(!request.dry_run);

    assert_eq!(client.state(), SessionState::Streaming);
    client.shutdown();
    client.join().await;
}

#[tokio::test]
async fn test_session_ids_are_unique() {
    let (a, _, _ca) = start().await;
    let (b, _, _cb) = start().await;
    assert_ne!(a.session_id(), b.session_id());
    assert_eq!(a.session_id().len(), 36);
}

#[tokio::test]
async fn test_start_fails_without_coordinator() {
    let transport = MemoryTransport::new();
    transport.push_control_error(StreamError::ConnectionRefused("refused".into()));

    let err = Client::start(options(), Arc::new(transport))
        .await
        .err()
        .expect("start should fail");
    assert!(matches!(err, ClientError::Registration(ref e) if e.is_connection_refused()));
}

#[tokio::test]
async fn test_start_rejects_bad_options() {
    let transport = MemoryTransport::new();

    let err = Client::start(ClientOptions::new(""), Arc::new(transport.clone()))
        .await
        .err()
        .expect("empty service name should be rejected");
    assert!(matches!(err, ClientError::InvalidConfig(_)));

    let err = Client::start(
        options().with_tail_config(TailConfig::default().with_workers(0)),
        Arc::new(transport.clone()),
    )
    .await
    .err()
    .expect("zero workers should be rejected");
    assert!(matches!(err, ClientError::InvalidConfig(_)));

    assert_eq!(transport.control_opens(), 0);
}

#[tokio::test]
async fn test_start_during_shutdown() {
    let transport = MemoryTransport::new();
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let client = Client::start_with_shutdown(options(), Arc::new(transport), shutdown)
        .await
        .unwrap();
    assert_eq!(client.state(), SessionState::ShuttingDown);
    client.join().await;
}

#[tokio::test]
async fn test_pipeline_lifecycle_end_to_end() {
    let (client, _transport, control) = start().await;

    control.send(Command::attach(orders(), Pipeline::new("p1", "mask")));
    eventually("attach", || active_ids(&client) == ["p1"]).await;

    control.send(Command::pause(orders(), "p1"));
    eventually("pause", || active_ids(&client).is_empty()).await;
    assert_eq!(client.paused_pipelines_for(&orders()).len(), 1);

    control.send(Command::resume(orders(), "p1"));
    eventually("resume", || active_ids(&client) == ["p1"]).await;

    control.send(Command::detach(orders(), "p1"));
    eventually("detach", || active_ids(&client).is_empty()).await;
    assert!(client.paused_pipelines_for(&orders()).is_empty());

    client.shutdown();
    client.join().await;
}

#[tokio::test]
async fn test_paused_pipeline_can_be_detached() {
    let (client, _transport, control) = start().await;

    control.send(Command::attach(orders(), Pipeline::new("p1", "mask")));
    control.send(Command::pause(orders(), "p1"));
    control.send(Command::detach(orders(), "p1"));
    control.send(Command::resume(orders(), "p1"));
    control.send(Command::attach(orders(), Pipeline::new("marker", "marker")));

    eventually("marker", || active_ids(&client) == ["marker"]).await;
    assert!(client.paused_pipelines_for(&orders()).is_empty());
}

#[tokio::test]
async fn test_tail_end_to_end() {
    let (client, transport, control) = start().await;

    control.send(Command::attach(orders(), Pipeline::new("p1", "mask")));
    control.send(Command::tail_start(TailRequest::start("t1", orders(), "p1")));
    eventually("tail start", || client.tails().has_session(&orders(), "p1", "t1")).await;

    let enqueued = client
        .publish_tail(&orders(), "p1", &b"{\"ssn\":\"123\"}"[..], &b"{\"ssn\":\"***\"}"[..])
        .await;
    assert_eq!(enqueued, 1);

    timeout(
        Duration::from_secs(2),
        transport.wait_for(|t| !t.sent_records().is_empty()),
    )
    .await
    .unwrap();

    let record = &transport.sent_records()[0].record;
    assert_eq!(record.session_id, client.session_id());
    assert_eq!(record.new_data, Bytes::from_static(b"{\"ssn\":\"***\"}"));

    control.send(Command::tail_stop(TailRequest::stop("t1", orders(), "p1")));
    eventually("tail stop", || client.tails().session_count() == 0).await;
    assert_eq!(client.publish_tail(&orders(), "p1", "a", "b").await, 0);

    client.shutdown();
    client.join().await;
}

#[tokio::test]
async fn test_tail_on_unknown_pipeline_is_ignored() {
    let (client, transport, control) = start().await;

    control.send(Command::tail_start(TailRequest::start("t1", orders(), "nope")));
    control.send(Command::attach(orders(), Pipeline::new("marker", "marker")));
    eventually("marker", || active_ids(&client) == ["marker"]).await;

    assert_eq!(client.tails().session_count(), 0);
    assert_eq!(transport.tail_streams_opened(), 0);
}

#[tokio::test]
async fn test_schema_publish_end_to_end() {
    let (client, transport, _control) = start().await;
    let step = PipelineStep::new("infer", StepKind::InferSchema);
    let schema = StepResult::success(&b"{\"type\":\"object\"}"[..]);

    assert!(client.notify_schema_output(&orders(), &step, &schema));
    assert!(!client.notify_schema_output(&orders(), &step, &schema));

    timeout(
        Duration::from_secs(2),
        transport.wait_for(|t| t.schemas().len() == 1),
    )
    .await
    .unwrap();
    assert_eq!(client.schema(&orders()), schema.output);
}

#[tokio::test]
async fn test_schema_reported_from_engine_thread() {
    let (client, transport, _control) = start().await;
    let step = PipelineStep::new("infer", StepKind::InferSchema);
    let schema = StepResult::success(&b"{\"type\":\"array\"}"[..]);

    let published = std::thread::scope(|scope| {
        scope
            .spawn(|| client.notify_schema_output(&orders(), &step, &schema))
            .join()
            .unwrap()
    });
    assert!(published);

    timeout(
        Duration::from_secs(2),
        transport.wait_for(|t| t.schemas().len() == 1),
    )
    .await
    .unwrap();
    assert_eq!(transport.schemas()[0].schema, schema.output);
}

#[tokio::test]
async fn test_survives_coordinator_restart() {
    let (client, transport, first) = start().await;
    let second = transport.push_control_stream();

    first.send(Command::attach(orders(), Pipeline::new("p1", "mask")));
    eventually("attach", || active_ids(&client) == ["p1"]).await;

    first.close();
    eventually("reconnect", || transport.registrations().len() == 2).await;

    // state survives the reconnect
    assert_eq!(active_ids(&client), ["p1"]);

    second.send(Command::pause(orders(), "p1"));
    eventually("pause on new stream", || active_ids(&client).is_empty()).await;

    client.shutdown();
    timeout(Duration::from_secs(1), client.join()).await.unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_tails() {
    let (client, transport, control) = start().await;

    control.send(Command::attach(orders(), Pipeline::new("p1", "mask")));
    control.send(Command::tail_start(TailRequest::start("t1", orders(), "p1")));
    eventually("tail start", || client.tails().session_count() == 1).await;

    let mut state = client.subscribe_state();
    client.shutdown();
    state
        .wait_for(|s| *s == SessionState::ShuttingDown)
        .await
        .unwrap();

    assert!(client.is_shutdown());
    eventually("tails stopped", || client.tails().session_count() == 0).await;
    assert_eq!(client.publish_tail(&orders(), "p1", "a", "b").await, 0);
    assert_eq!(transport.sent_records().len(), 0);
}

#[tokio::test]
async fn test_dropping_client_ends_session() {
    let transport = MemoryTransport::new();
    let control = transport.push_control_stream();
    let shutdown = CancellationToken::new();
    let client = Client::start_with_shutdown(options(), Arc::new(transport.clone()), shutdown.clone())
        .await
        .unwrap();

    control.send(Command::attach(orders(), Pipeline::new("p1", "mask")));
    control.send(Command::tail_start(TailRequest::start("t1", orders(), "p1")));
    eventually("tail start", || client.tails().session_count() == 1).await;

    drop(client);

    assert!(shutdown.is_cancelled());
    eventually("control stream released", || control.is_closed()).await;
}
