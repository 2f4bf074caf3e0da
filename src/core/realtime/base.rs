//! Base traits and types for real-time speech AI transports.
//!
//! A speech transport carries JSON events to and from a conversational speech
//! endpoint for the lifetime of one call. The [`SpeechConnector`] opens a
//! connection and hands back a [`SpeechConnection`]: a sending half shared by
//! the call's components and a receiving stream of typed [`ServerEvent`]s that
//! is consumed by exactly one dispatch loop.
//!
//! # Audio Format
//!
//! Audio crossing the transport is PCM 16-bit signed little-endian mono,
//! base64 encoded inside JSON events.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::messages::{ClientEvent, ServerEvent};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during speech transport operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The provider sent something that violates the session protocol
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Provider-specific error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// Session error
    #[error("Session error: {0}")]
    SessionError(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Connection State
// =============================================================================

/// Connection state for a speech transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected to the provider
    #[default]
    Disconnected,
    /// Currently connecting
    Connecting,
    /// Connected and ready
    Connected,
    /// Connection failed
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Transport Traits
// =============================================================================

/// Sending half of an open speech connection.
///
/// Implementations must be cheap to share behind an `Arc`; `send` may be
/// called concurrently from the bridge inbound loop and the session manager.
#[async_trait]
pub trait SpeechTransport: Send + Sync {
    /// Queue a client event for delivery.
    ///
    /// Returns [`RealtimeError::NotConnected`] once the transport is closed.
    async fn send(&self, event: ClientEvent) -> RealtimeResult<()>;

    /// Close the transport. Calling this more than once is a no-op.
    async fn close(&self);

    /// Whether the underlying connection is still open.
    fn is_open(&self) -> bool;
}

/// An established speech connection.
pub struct SpeechConnection {
    /// Shared sending half.
    pub transport: Arc<dyn SpeechTransport>,
    /// Inbound server events, in arrival order. Ends when the connection closes.
    pub events: mpsc::Receiver<ServerEvent>,
}

impl fmt::Debug for SpeechConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechConnection")
            .field("open", &self.transport.is_open())
            .finish()
    }
}

/// Factory for per-call speech connections.
#[async_trait]
pub trait SpeechConnector: Send + Sync {
    /// Open a new connection on behalf of `call_id`.
    ///
    /// Authentication rejections surface as [`RealtimeError::AuthenticationFailed`],
    /// network failures as [`RealtimeError::ConnectionFailed`].
    async fn connect(&self, call_id: &str) -> RealtimeResult<SpeechConnection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_error_display() {
        let err = RealtimeError::ConnectionFailed("test".to_string());
        assert!(err.to_string().contains("Connection failed"));

        let err = RealtimeError::AuthenticationFailed("401".to_string());
        assert!(err.to_string().contains("Authentication failed"));

        let err = RealtimeError::ProtocolError("bad frame".to_string());
        assert_eq!(err.to_string(), "Protocol error: bad frame");

        let err = RealtimeError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");
    }
}
