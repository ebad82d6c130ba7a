//! Frame codec for the control-plane wire protocol
//!
//! Simple length-prefixed binary format shared by every stream the client
//! opens against the coordinator.
//!
//! # Wire Format
//!
//! ```text
//! ┌──────────────┬──────────┬──────────────────────────┐
//! │ 4 bytes      │ 1 byte   │ N bytes                  │
//! │ length (BE)  │ msg type │ body                     │
//! └──────────────┴──────────┴──────────────────────────┘
//! ```
//!
//! Strings and byte fields are `[u32 BE length][bytes]`.
//!
//! # Message Types
//!
//! - `Register` (0x01): Client → Coordinator, control stream handshake
//! - `Command` (0x02): Coordinator → Client, control stream payload
//! - `OpenTail` (0x03): Client → Coordinator, tail stream handshake
//! - `TailRecord` (0x04): Client → Coordinator, tail stream payload
//! - `Schema` (0x05): Client → Coordinator, schema publish

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::audience::{Audience, OperationType};
use crate::command::{Command, CommandKind};
use crate::error::ProtocolError;
use crate::pipeline::{Pipeline, PipelineStep, StepKind};
use crate::register::{ClientInfo, ClientType, RegisterRequest};
use crate::schema::SchemaUpdate;
use crate::tail::{TailRecord, TailRequest, TailRequestType, TailResponseType};
use crate::{MAX_FRAME_SIZE, Result};

/// Message type discriminants
const MSG_REGISTER: u8 = 0x01;
const MSG_COMMAND: u8 = 0x02;
const MSG_OPEN_TAIL: u8 = 0x03;
const MSG_TAIL_RECORD: u8 = 0x04;
const MSG_SCHEMA: u8 = 0x05;

/// Command discriminants (0 = empty command)
const CMD_EMPTY: u8 = 0;
const CMD_KEEP_ALIVE: u8 = 1;
const CMD_ATTACH: u8 = 2;
const CMD_DETACH: u8 = 3;
const CMD_PAUSE: u8 = 4;
const CMD_RESUME: u8 = 5;
const CMD_TAIL_START: u8 = 6;
const CMD_TAIL_STOP: u8 = 7;

/// Messages exchanged between client and coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Client → Coordinator: open control stream
    Register(RegisterRequest),
    /// Coordinator → Client: command
    Command(Command),
    /// Client → Coordinator: open tail stream for a session
    OpenTail { session_id: String },
    /// Client → Coordinator: tail record
    TailRecord(TailRecord),
    /// Client → Coordinator: schema update
    Schema(SchemaUpdate),
}

impl Frame {
    /// Encode frame to bytes with length prefix
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(256);

        // Reserve space for length prefix (filled in at end)
        buf.put_u32(0);

        match self {
            Frame::Register(req) => {
                buf.put_u8(MSG_REGISTER);
                encode_register(req, &mut buf);
            }
            Frame::Command(cmd) => {
                buf.put_u8(MSG_COMMAND);
                encode_command(cmd, &mut buf);
            }
            Frame::OpenTail { session_id } => {
                buf.put_u8(MSG_OPEN_TAIL);
                encode_string(session_id, &mut buf);
            }
            Frame::TailRecord(record) => {
                buf.put_u8(MSG_TAIL_RECORD);
                encode_tail_record(record, &mut buf);
            }
            Frame::Schema(update) => {
                buf.put_u8(MSG_SCHEMA);
                encode_audience(&update.audience, &mut buf);
                encode_bytes(&update.schema, &mut buf);
            }
        }

        // Write length prefix (excluding the 4-byte length field itself)
        let len = (buf.len() - 4) as u32;
        buf[0..4].copy_from_slice(&len.to_be_bytes());

        buf.freeze()
    }

    /// Decode frame from bytes (without length prefix)
    pub fn decode(mut buf: Bytes) -> Result<Self> {
        if buf.is_empty() {
            return Err(ProtocolError::EmptyFrame);
        }

        match buf.get_u8() {
            MSG_REGISTER => Ok(Frame::Register(decode_register(&mut buf)?)),
            MSG_COMMAND => Ok(Frame::Command(decode_command(&mut buf)?)),
            MSG_OPEN_TAIL => Ok(Frame::OpenTail {
                session_id: decode_string(&mut buf, "session id")?,
            }),
            MSG_TAIL_RECORD => Ok(Frame::TailRecord(decode_tail_record(&mut buf)?)),
            MSG_SCHEMA => {
                let audience = decode_audience(&mut buf)?;
                let schema = decode_bytes(&mut buf, "schema")?;
                Ok(Frame::Schema(SchemaUpdate { audience, schema }))
            }
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

/// Read the 4-byte big-endian length prefix, validating the frame size
pub fn read_length_prefix(buf: &[u8]) -> Result<usize> {
    if buf.len() < 4 {
        return Err(ProtocolError::Truncated("length prefix"));
    }
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::frame_too_large(len));
    }
    Ok(len)
}

// ============================================================================
// Message bodies
// ============================================================================

fn encode_register(req: &RegisterRequest, buf: &mut BytesMut) {
    encode_string(&req.service_name, buf);
    encode_string(&req.session_id, buf);

    let info = &req.client_info;
    buf.put_u8(info.client_type as u8);
    encode_string(&info.library_name, buf);
    encode_string(&info.library_version, buf);
    encode_string(&info.language, buf);
    encode_string(&info.arch, buf);
    encode_string(&info.os, buf);

    buf.put_u32(req.audiences.len() as u32);
    for aud in &req.audiences {
        encode_audience(aud, buf);
    }

    buf.put_u8(u8::from(req.dry_run));
}

fn decode_register(buf: &mut Bytes) -> Result<RegisterRequest> {
    let service_name = decode_string(buf, "service name")?;
    let session_id = decode_string(buf, "session id")?;

    let client_info = ClientInfo {
        client_type: ClientType::from_u8(decode_u8(buf, "client type")?),
        library_name: decode_string(buf, "library name")?,
        library_version: decode_string(buf, "library version")?,
        language: decode_string(buf, "language")?,
        arch: decode_string(buf, "arch")?,
        os: decode_string(buf, "os")?,
    };

    let count = decode_u32(buf, "audience count")? as usize;
    let mut audiences = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        audiences.push(decode_audience(buf)?);
    }

    let dry_run = decode_u8(buf, "dry run")? != 0;

    Ok(RegisterRequest {
        service_name,
        session_id,
        client_info,
        audiences,
        dry_run,
    })
}

fn encode_command(cmd: &Command, buf: &mut BytesMut) {
    encode_audience(&cmd.audience, buf);

    match &cmd.kind {
        None => buf.put_u8(CMD_EMPTY),
        Some(CommandKind::KeepAlive) => buf.put_u8(CMD_KEEP_ALIVE),
        Some(CommandKind::AttachPipeline(pipeline)) => {
            buf.put_u8(CMD_ATTACH);
            encode_pipeline(pipeline, buf);
        }
        Some(CommandKind::DetachPipeline { pipeline_id }) => {
            buf.put_u8(CMD_DETACH);
            encode_string(pipeline_id, buf);
        }
        Some(CommandKind::PausePipeline { pipeline_id }) => {
            buf.put_u8(CMD_PAUSE);
            encode_string(pipeline_id, buf);
        }
        Some(CommandKind::ResumePipeline { pipeline_id }) => {
            buf.put_u8(CMD_RESUME);
            encode_string(pipeline_id, buf);
        }
        Some(CommandKind::TailStart(req)) => {
            buf.put_u8(CMD_TAIL_START);
            encode_tail_request(req, buf);
        }
        Some(CommandKind::TailStop(req)) => {
            buf.put_u8(CMD_TAIL_STOP);
            encode_tail_request(req, buf);
        }
    }
}

fn decode_command(buf: &mut Bytes) -> Result<Command> {
    let audience = decode_audience(buf)?;

    let kind = match decode_u8(buf, "command type")? {
        CMD_EMPTY => None,
        CMD_KEEP_ALIVE => Some(CommandKind::KeepAlive),
        CMD_ATTACH => Some(CommandKind::AttachPipeline(decode_pipeline(buf)?)),
        CMD_DETACH => Some(CommandKind::DetachPipeline {
            pipeline_id: decode_string(buf, "pipeline id")?,
        }),
        CMD_PAUSE => Some(CommandKind::PausePipeline {
            pipeline_id: decode_string(buf, "pipeline id")?,
        }),
        CMD_RESUME => Some(CommandKind::ResumePipeline {
            pipeline_id: decode_string(buf, "pipeline id")?,
        }),
        CMD_TAIL_START => Some(CommandKind::TailStart(decode_tail_request(buf)?)),
        CMD_TAIL_STOP => Some(CommandKind::TailStop(decode_tail_request(buf)?)),
        other => return Err(ProtocolError::UnknownCommandType(other)),
    };

    Ok(Command { audience, kind })
}

fn encode_pipeline(pipeline: &Pipeline, buf: &mut BytesMut) {
    encode_string(&pipeline.id, buf);
    encode_string(&pipeline.name, buf);
    buf.put_u32(pipeline.steps.len() as u32);
    for step in &pipeline.steps {
        encode_string(&step.name, buf);
        buf.put_u8(step.kind.as_u8());
        encode_bytes(&step.config, buf);
    }
}

fn decode_pipeline(buf: &mut Bytes) -> Result<Pipeline> {
    let id = decode_string(buf, "pipeline id")?;
    let name = decode_string(buf, "pipeline name")?;

    let count = decode_u32(buf, "step count")? as usize;
    let mut steps = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        steps.push(PipelineStep {
            name: decode_string(buf, "step name")?,
            kind: StepKind::from_u8(decode_u8(buf, "step kind")?),
            config: decode_bytes(buf, "step config")?,
        });
    }

    Ok(Pipeline { id, name, steps })
}

fn encode_tail_request(req: &TailRequest, buf: &mut BytesMut) {
    encode_string(&req.id, buf);
    encode_audience(&req.audience, buf);
    encode_string(&req.pipeline_id, buf);
    buf.put_u8(req.request_type as u8);
}

fn decode_tail_request(buf: &mut Bytes) -> Result<TailRequest> {
    Ok(TailRequest {
        id: decode_string(buf, "tail id")?,
        audience: decode_audience(buf)?,
        pipeline_id: decode_string(buf, "pipeline id")?,
        request_type: TailRequestType::from_u8(decode_u8(buf, "tail request type")?),
    })
}

fn encode_tail_record(record: &TailRecord, buf: &mut BytesMut) {
    buf.put_u8(record.response_type as u8);
    encode_string(&record.tail_request_id, buf);
    encode_audience(&record.audience, buf);
    encode_string(&record.pipeline_id, buf);
    encode_string(&record.session_id, buf);
    buf.put_i64(record.timestamp_ns);
    encode_bytes(&record.original_data, buf);
    encode_bytes(&record.new_data, buf);
}

fn decode_tail_record(buf: &mut Bytes) -> Result<TailRecord> {
    let response_type = TailResponseType::from_u8(decode_u8(buf, "response type")?);
    let tail_request_id = decode_string(buf, "tail request id")?;
    let audience = decode_audience(buf)?;
    let pipeline_id = decode_string(buf, "pipeline id")?;
    let session_id = decode_string(buf, "session id")?;

    if buf.remaining() < 8 {
        return Err(ProtocolError::Truncated("timestamp"));
    }
    let timestamp_ns = buf.get_i64();

    Ok(TailRecord {
        response_type,
        tail_request_id,
        audience,
        pipeline_id,
        session_id,
        timestamp_ns,
        original_data: decode_bytes(buf, "original data")?,
        new_data: decode_bytes(buf, "new data")?,
    })
}

// ============================================================================
// Encoding helpers
// ============================================================================

fn encode_audience(aud: &Audience, buf: &mut BytesMut) {
    encode_string(&aud.service_name, buf);
    encode_string(&aud.component_name, buf);
    buf.put_u8(aud.operation_type.as_u8());
    encode_string(&aud.operation_name, buf);
}

fn decode_audience(buf: &mut Bytes) -> Result<Audience> {
    Ok(Audience {
        service_name: decode_string(buf, "service name")?,
        component_name: decode_string(buf, "component name")?,
        operation_type: OperationType::from_u8(decode_u8(buf, "operation type")?),
        operation_name: decode_string(buf, "operation name")?,
    })
}

fn encode_string(s: &str, buf: &mut BytesMut) {
    encode_bytes(s.as_bytes(), buf);
}

fn decode_string(buf: &mut Bytes, field: &'static str) -> Result<String> {
    let bytes = decode_bytes(buf, field)?;
    String::from_utf8(bytes.to_vec()).map_err(|e| ProtocolError::InvalidUtf8 {
        field,
        message: e.to_string(),
    })
}

fn encode_bytes(bytes: &[u8], buf: &mut BytesMut) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn decode_bytes(buf: &mut Bytes, field: &'static str) -> Result<Bytes> {
    let len = decode_u32(buf, field)? as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::Truncated(field));
    }
    Ok(buf.split_to(len))
}

fn decode_u8(buf: &mut Bytes, field: &'static str) -> Result<u8> {
    if buf.remaining() < 1 {
        return Err(ProtocolError::Truncated(field));
    }
    Ok(buf.get_u8())
}

fn decode_u32(buf: &mut Bytes, field: &'static str) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::Truncated(field));
    }
    Ok(buf.get_u32())
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod tests;
