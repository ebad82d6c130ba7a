//! TCP transport
//!
//! Every stream is its own TCP connection carrying length-prefixed frames
//! (see `tether_protocol::Frame`). The first frame on a connection says what
//! the connection is for: `Register` for the control stream, `OpenTail` for a
//! tail stream, `Schema` for a one-shot schema publish.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tether_protocol::{Command, Frame, RegisterRequest, SchemaUpdate, TailRecord, read_length_prefix};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::debug;

use crate::{ControlStream, Result, StreamError, TailStream, Transport};

/// Configuration for the TCP transport
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// Coordinator address (host:port)
    pub address: String,

    /// Connection timeout
    pub connection_timeout: Duration,

    /// Write timeout per frame
    pub write_timeout: Duration,
}

impl TcpTransportConfig {
    /// Create a config for the given coordinator address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connection_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
        }
    }

    /// Set connection timeout
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set write timeout
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// Transport speaking the frame codec over TCP
#[derive(Debug, Clone)]
pub struct TcpTransport {
    config: TcpTransportConfig,
}

impl TcpTransport {
    /// Create a new TCP transport
    pub fn new(config: TcpTransportConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<TcpStream> {
        let stream = match timeout(
            self.config.connection_timeout,
            TcpStream::connect(&self.config.address),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(StreamError::Transient(format!(
                    "connection to {} timed out",
                    self.config.address
                )));
            }
        };

        // Non-fatal if it fails
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to set TCP_NODELAY, continuing with default buffering");
        }

        debug!(address = %self.config.address, "connected to coordinator");
        Ok(stream)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open_control_stream(
        &self,
        request: &RegisterRequest,
    ) -> Result<Box<dyn ControlStream>> {
        let mut stream = self.connect().await?;
        let frame = Frame::Register(request.clone()).encode();
        write_frame(&mut stream, &frame, self.config.write_timeout).await?;

        Ok(Box::new(TcpControlStream {
            stream,
            buf: BytesMut::new(),
            poisoned: false,
        }))
    }

    async fn open_tail_stream(&self, session_id: &str) -> Result<Box<dyn TailStream>> {
        let mut stream = self.connect().await?;
        let frame = Frame::OpenTail {
            session_id: session_id.to_string(),
        }
        .encode();
        write_frame(&mut stream, &frame, self.config.write_timeout).await?;

        let (reader, writer) = stream.into_split();
        Ok(Box::new(TcpTailStream {
            reader,
            writer,
            write_timeout: self.config.write_timeout,
            poisoned: false,
        }))
    }

    async fn send_schema(&self, update: &SchemaUpdate) -> Result<()> {
        let mut stream = self.connect().await?;
        let frame = Frame::Schema(update.clone()).encode();
        write_frame(&mut stream, &frame, self.config.write_timeout).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

/// Control stream over a TCP connection
struct TcpControlStream {
    stream: TcpStream,
    buf: BytesMut,
    /// Set once framing is lost; the stream then reports end of stream
    poisoned: bool,
}

#[async_trait]
impl ControlStream for TcpControlStream {
    async fn recv(&mut self) -> Result<Command> {
        if self.poisoned {
            return Err(StreamError::EndOfStream);
        }

        loop {
            match read_frame(&mut self.stream, &mut self.buf).await {
                Ok(Frame::Command(command)) => return Ok(command),
                Ok(other) => {
                    debug!(frame = ?other, "ignoring unexpected frame on control stream");
                }
                Err(e @ StreamError::Protocol(_)) => {
                    self.poisoned = true;
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Tail stream over a TCP connection
///
/// The coordinator never writes to a tail stream; the read half only exists
/// to notice when it hangs up.
struct TcpTailStream {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    write_timeout: Duration,
    /// Set after a failed write, which may have left a partial frame behind
    poisoned: bool,
}

#[async_trait]
impl TailStream for TcpTailStream {
    async fn send(&mut self, record: TailRecord) -> Result<()> {
        if self.poisoned {
            return Err(StreamError::EndOfStream);
        }

        let frame = Frame::TailRecord(record).encode();
        let result = write_frame(&mut self.writer, &frame, self.write_timeout).await;
        self.poisoned = result.is_err();
        result
    }

    async fn closed(&mut self) {
        let mut scratch = [0u8; 256];
        loop {
            match self.reader.read(&mut scratch).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
        }
    }
}

async fn write_frame<W>(writer: &mut W, frame: &[u8], write_timeout: Duration) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match timeout(write_timeout, writer.write_all(frame)).await {
        Ok(result) => result.map_err(StreamError::from),
        Err(_) => Err(StreamError::Io(std::io::Error::new(
            ErrorKind::TimedOut,
            "write timed out",
        ))),
    }
}

/// Read one frame
///
/// Cancel safe: partial reads accumulate in `buf` and are resumed on the
/// next call.
async fn read_frame<R>(reader: &mut R, buf: &mut BytesMut) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    loop {
        if buf.len() >= 4 {
            let len = read_length_prefix(&buf[..])?;
            if buf.len() >= 4 + len {
                let mut frame = buf.split_to(4 + len);
                let body = frame.split_off(4).freeze();
                return Frame::decode(body).map_err(|e| {
                    if e.is_recoverable() {
                        StreamError::Transient(e.to_string())
                    } else {
                        StreamError::Protocol(e)
                    }
                });
            }
        }

        if reader.read_buf(buf).await? == 0 {
            return Err(StreamError::EndOfStream);
        }
    }
}

#[cfg(test)]
#[path = "tcp_test.rs"]
mod tests;
