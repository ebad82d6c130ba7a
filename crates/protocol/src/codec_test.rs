//! Tests for the frame codec

use super::*;

fn audience() -> Audience {
    Audience::new("billing", "kafka", OperationType::Consumer, "orders")
}

/// Encode then strip the 4-byte length prefix
fn body(frame: &Frame) -> Bytes {
    frame.encode().slice(4..)
}

// ============================================================================
// Framing
// ============================================================================

#[test]
fn test_length_prefix_matches_body() {
    let frame = Frame::Command(Command::keep_alive());
    let encoded = frame.encode();

    let len = read_length_prefix(&encoded).unwrap();
    assert_eq!(len, encoded.len() - 4);
}

#[test]
fn test_length_prefix_rejects_oversize() {
    let huge = ((MAX_FRAME_SIZE + 1) as u32).to_be_bytes();
    assert!(matches!(
        read_length_prefix(&huge),
        Err(ProtocolError::FrameTooLarge { .. })
    ));
}

#[test]
fn test_length_prefix_truncated() {
    assert!(matches!(
        read_length_prefix(&[0, 0]),
        Err(ProtocolError::Truncated(_))
    ));
}

#[test]
fn test_decode_empty_frame() {
    assert!(matches!(
        Frame::decode(Bytes::new()),
        Err(ProtocolError::EmptyFrame)
    ));
}

#[test]
fn test_decode_unknown_message_type() {
    let err = Frame::decode(Bytes::from_static(&[0x7f])).unwrap_err();
    assert!(matches!(err, ProtocolError::UnknownMessageType(0x7f)));
    assert!(err.is_recoverable());
}

// ============================================================================
// Commands
// ============================================================================

#[test]
fn test_attach_command_roundtrip() {
    let pipeline = Pipeline::new("p1", "mask emails")
        .with_step(PipelineStep::new("detect", StepKind::Detective).with_config(&b"$.email"[..]))
        .with_step(PipelineStep::new("infer", StepKind::InferSchema));
    let frame = Frame::Command(Command::attach(audience(), pipeline));

    let decoded = Frame::decode(body(&frame)).unwrap();
    assert_eq!(decoded, frame);
}

#[test]
fn test_pipeline_id_commands_roundtrip() {
    for cmd in [
        Command::detach(audience(), "p1"),
        Command::pause(audience(), "p2"),
        Command::resume(audience(), "p3"),
    ] {
        let frame = Frame::Command(cmd);
        assert_eq!(Frame::decode(body(&frame)).unwrap(), frame);
    }
}

#[test]
fn test_tail_commands_roundtrip() {
    let start = Frame::Command(Command::tail_start(TailRequest::start("t1", audience(), "p1")));
    let stop = Frame::Command(Command::tail_stop(TailRequest::stop("t1", audience(), "p1")));

    assert_eq!(Frame::decode(body(&start)).unwrap(), start);
    assert_eq!(Frame::decode(body(&stop)).unwrap(), stop);
}

#[test]
fn test_empty_command_decodes_without_kind() {
    let frame = Frame::Command(Command {
        audience: audience(),
        kind: None,
    });

    match Frame::decode(body(&frame)).unwrap() {
        Frame::Command(cmd) => {
            assert!(cmd.kind.is_none());
            assert_eq!(cmd.kind_name(), "empty");
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[test]
fn test_unknown_command_type() {
    let mut encoded = BytesMut::from(&body(&Frame::Command(Command::keep_alive()))[..]);
    // Last byte is the command discriminant for a keep-alive
    let last = encoded.len() - 1;
    encoded[last] = 0xee;

    assert!(matches!(
        Frame::decode(encoded.freeze()),
        Err(ProtocolError::UnknownCommandType(0xee))
    ));
}

#[test]
fn test_truncated_command() {
    let full = body(&Frame::Command(Command::detach(audience(), "pipeline-1")));
    let cut = full.slice(..full.len() - 3);

    assert!(matches!(
        Frame::decode(cut),
        Err(ProtocolError::Truncated("pipeline id"))
    ));
}

#[test]
fn test_invalid_utf8_field() {
    // msg type, then a 2-byte "service name" that is not UTF-8
    let raw = Bytes::from_static(&[MSG_COMMAND, 0, 0, 0, 2, 0xff, 0xfe]);
    assert!(matches!(
        Frame::decode(raw),
        Err(ProtocolError::InvalidUtf8 {
            field: "service name",
            ..
        })
    ));
}

// ============================================================================
// Client → coordinator frames
// ============================================================================

#[test]
fn test_register_roundtrip() {
    let frame = Frame::Register(RegisterRequest {
        service_name: "billing".into(),
        session_id: "5b1c".into(),
        client_info: ClientInfo::current(ClientType::Shim),
        audiences: vec![audience(), Audience::default()],
        dry_run: true,
    });

    assert_eq!(Frame::decode(body(&frame)).unwrap(), frame);
}

#[test]
fn test_tail_record_roundtrip() {
    let frame = Frame::TailRecord(TailRecord {
        response_type: TailResponseType::Payload,
        tail_request_id: "t1".into(),
        audience: audience(),
        pipeline_id: "p1".into(),
        session_id: "s1".into(),
        timestamp_ns: 1_700_000_000_000_000_000,
        original_data: Bytes::from_static(br#"{"email":"a@b.c"}"#),
        new_data: Bytes::from_static(br#"{"email":"***"}"#),
    });

    assert_eq!(Frame::decode(body(&frame)).unwrap(), frame);
}

#[test]
fn test_schema_and_open_tail_roundtrip() {
    let schema = Frame::Schema(SchemaUpdate::new(audience(), &br#"{"type":"object"}"#[..]));
    let open = Frame::OpenTail {
        session_id: "s1".into(),
    };

    assert_eq!(Frame::decode(body(&schema)).unwrap(), schema);
    assert_eq!(Frame::decode(body(&open)).unwrap(), open);
}
