//! Transport abstraction between the connection core and the socket.
//!
//! The upgrade/handshake layer hands the core a bidirectional message
//! channel; the core only sees [`Frame`]s. Implemented for
//! `axum::extract::ws::WebSocket`; tests substitute a channel-backed fake.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use thiserror::Error;

/// One transport frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("transport error: {0}")]
    Io(String),
}

/// Read half of a transport.
#[async_trait]
pub trait TransportReader: Send + 'static {
    /// Next inbound frame. `None` means the peer closed the stream.
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;
}

/// Write half of a transport.
#[async_trait]
pub trait TransportWriter: Send + 'static {
    async fn send_frame(&mut self, frame: Frame) -> Result<(), TransportError>;
}

/// A transport that can be split into independent read and write halves, one
/// per connection task.
pub trait MixTransport: Send + 'static {
    type Reader: TransportReader;
    type Writer: TransportWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}

impl MixTransport for WebSocket {
    type Reader = SplitStream<WebSocket>;
    type Writer = SplitSink<WebSocket, Message>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (sink, stream) = StreamExt::split(self);
        (stream, sink)
    }
}

#[async_trait]
impl TransportReader for SplitStream<WebSocket> {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            return match self.next().await? {
                Ok(Message::Text(text)) => Some(Ok(Frame::Text(text))),
                Ok(Message::Ping(payload)) => Some(Ok(Frame::Ping(payload))),
                Ok(Message::Pong(payload)) => Some(Ok(Frame::Pong(payload))),
                Ok(Message::Close(_)) => Some(Ok(Frame::Close)),
                // Binary frames are not part of the protocol; skip them.
                Ok(Message::Binary(_)) => continue,
                Err(e) => Some(Err(TransportError::Io(e.to_string()))),
            };
        }
    }
}

#[async_trait]
impl TransportWriter for SplitSink<WebSocket, Message> {
    async fn send_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Ping(payload) => Message::Ping(payload),
            Frame::Pong(payload) => Message::Pong(payload),
            Frame::Close => Message::Close(None),
        };
        self.send(message)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}
