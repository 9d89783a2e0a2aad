//! Transport abstraction module
//!
//! Provides a message-oriented interface over TCP and WebSocket connections so
//! that native clients (TCP) and browser clients (WebSocket) share the same
//! stream processing code.
//!
//! TCP carries one message per length-delimited frame (4-byte big-endian
//! length, then UTF-8 payload). WebSocket carries one message per data frame.

use std::future::Future;
use std::io;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::{debug, trace, warn};

use crate::error::{MuddyError, NetworkError, ProtocolError, Result};

/// Largest frame the server will write (64KB)
pub const MAX_OUTBOUND_FRAME: usize = 65536;

/// A bidirectional stream of text messages
pub trait MessageStream: Send {
    /// Read the next message. `Ok(None)` means the peer closed the stream.
    ///
    /// Must be cancel-safe: dropping the future before completion may not
    /// lose a partially received message.
    fn read_message(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Write one message
    fn write_message(&mut self, message: &str) -> impl Future<Output = Result<()>> + Send;

    /// Close the stream gracefully
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Length-delimited framing over any byte stream
pub struct FramedTransport<S> {
    reader: FramedRead<ReadHalf<S>, LengthDelimitedCodec>,
    writer: FramedWrite<WriteHalf<S>, LengthDelimitedCodec>,
    max_message_len: usize,
}

impl<S> FramedTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    /// Wrap a byte stream, accepting inbound frames up to `max_message_len` bytes
    pub fn new(stream: S, max_message_len: usize) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let reader = FramedRead::new(
            read_half,
            LengthDelimitedCodec::builder()
                .max_frame_length(max_message_len)
                .new_codec(),
        );
        let writer = FramedWrite::new(
            write_half,
            LengthDelimitedCodec::builder()
                .max_frame_length(MAX_OUTBOUND_FRAME)
                .new_codec(),
        );
        Self {
            reader,
            writer,
            max_message_len,
        }
    }
}

impl<S> MessageStream for FramedTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn read_message(&mut self) -> Result<Option<String>> {
        match self.reader.next().await {
            Some(Ok(frame)) => {
                trace!(len = frame.len(), "Received frame");
                let text = String::from_utf8(frame.to_vec())
                    .map_err(|_| MuddyError::Protocol(ProtocolError::InvalidUtf8))?;
                Ok(Some(text))
            }
            Some(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Err(MuddyError::Protocol(ProtocolError::FrameTooLarge {
                    max: self.max_message_len,
                }))
            }
            Some(Err(e)) => Err(MuddyError::Network(NetworkError::ReadError(e.to_string()))),
            None => Ok(None),
        }
    }

    async fn write_message(&mut self, message: &str) -> Result<()> {
        trace!(len = message.len(), "Sending frame");
        self.writer
            .send(Bytes::copy_from_slice(message.as_bytes()))
            .await
            .map_err(|e| MuddyError::Network(NetworkError::WriteError(e.to_string())))
    }

    async fn close(&mut self) -> Result<()> {
        SinkExt::<Bytes>::close(&mut self.writer)
            .await
            .map_err(|e| MuddyError::Network(NetworkError::WriteError(e.to_string())))
    }
}

/// WebSocket transport for browser clients
pub struct WebSocketTransport<S> {
    stream: WebSocketStream<S>,
    max_message_len: usize,
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    /// Create a new WebSocket transport from an already-upgraded WebSocket stream
    pub fn new(stream: WebSocketStream<S>, max_message_len: usize) -> Self {
        Self {
            stream,
            max_message_len,
        }
    }

    /// Upgrade a raw stream to a WebSocket connection
    pub async fn accept(stream: S, max_message_len: usize) -> Result<Self> {
        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| MuddyError::Network(NetworkError::WebSocket(e.to_string())))?;

        Ok(Self::new(ws_stream, max_message_len))
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len > self.max_message_len {
            return Err(MuddyError::Protocol(ProtocolError::MessageTooLarge {
                size: len,
                max: self.max_message_len,
            }));
        }
        Ok(())
    }
}

impl<S> MessageStream for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn read_message(&mut self) -> Result<Option<String>> {
        // Loop past control frames
        loop {
            match self.stream.next().await {
                Some(Ok(message)) => match message {
                    Message::Text(text) => {
                        trace!(len = text.len(), "Received text WebSocket message");
                        self.check_len(text.len())?;
                        return Ok(Some(text));
                    }
                    Message::Binary(data) => {
                        trace!(len = data.len(), "Received binary WebSocket message");
                        self.check_len(data.len())?;
                        return String::from_utf8(data)
                            .map(Some)
                            .map_err(|_| MuddyError::Protocol(ProtocolError::InvalidUtf8));
                    }
                    Message::Close(_) => {
                        debug!("WebSocket close message received");
                        return Ok(None);
                    }
                    Message::Ping(data) => {
                        if let Err(e) = self.stream.send(Message::Pong(data)).await {
                            warn!("Failed to send pong: {}", e);
                        }
                    }
                    Message::Pong(_) | Message::Frame(_) => {}
                },
                Some(Err(e)) => {
                    return Err(MuddyError::Network(NetworkError::WebSocket(e.to_string())));
                }
                None => return Ok(None),
            }
        }
    }

    async fn write_message(&mut self, message: &str) -> Result<()> {
        trace!(len = message.len(), "Sending text WebSocket message");
        self.stream
            .send(Message::Text(message.to_owned()))
            .await
            .map_err(|e| MuddyError::Network(NetworkError::WebSocket(e.to_string())))
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| MuddyError::Network(NetworkError::WebSocket(e.to_string())))
    }
}

/// Unified transport enum for handling both TCP and WebSocket connections
pub enum UnifiedTransport {
    Tcp(FramedTransport<TcpStream>),
    WebSocket(WebSocketTransport<TcpStream>),
}

impl UnifiedTransport {
    /// Create a framed TCP transport
    pub fn tcp(stream: TcpStream, max_message_len: usize) -> Self {
        Self::Tcp(FramedTransport::new(stream, max_message_len))
    }

    /// Upgrade a TCP stream to a WebSocket transport
    pub async fn websocket(stream: TcpStream, max_message_len: usize) -> Result<Self> {
        Ok(Self::WebSocket(
            WebSocketTransport::accept(stream, max_message_len).await?,
        ))
    }
}

impl MessageStream for UnifiedTransport {
    async fn read_message(&mut self) -> Result<Option<String>> {
        match self {
            Self::Tcp(tcp) => tcp.read_message().await,
            Self::WebSocket(ws) => ws.read_message().await,
        }
    }

    async fn write_message(&mut self, message: &str) -> Result<()> {
        match self {
            Self::Tcp(tcp) => tcp.write_message(message).await,
            Self::WebSocket(ws) => ws.write_message(message).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Tcp(tcp) => tcp.close().await,
            Self::WebSocket(ws) => ws.close().await,
        }
    }
}
