//! Telephony media transport abstraction.
//!
//! The media WebSocket is split into a [`FrameSource`] (caller audio in) and a
//! [`FrameSink`] (assistant audio out) so the bridge can run each direction on
//! its own task. Tests substitute in-memory implementations.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Transport I/O error: {0}")]
    Io(String),
}

/// A message read from the telephony transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
    Text(String),
    /// Raw PCM audio
    Binary(Bytes),
}

/// Receiving half of a telephony transport.
#[async_trait]
pub trait FrameSource: Send {
    /// Next message, or `None` once the peer has closed.
    async fn next_message(&mut self) -> Option<Result<TransportMessage, TransportError>>;
}

/// Sending half of a telephony transport.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Both halves of an attached telephony transport.
pub struct TelephonyTransport {
    pub source: Box<dyn FrameSource>,
    pub sink: Box<dyn FrameSink>,
}

impl TelephonyTransport {
    pub fn new(source: Box<dyn FrameSource>, sink: Box<dyn FrameSink>) -> Self {
        Self { source, sink }
    }

    /// Close a transport that never got bridged.
    pub async fn close(mut self) -> Result<(), TransportError> {
        self.sink.close().await
    }
}

impl std::fmt::Debug for TelephonyTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelephonyTransport").finish_non_exhaustive()
    }
}
