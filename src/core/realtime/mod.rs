//! Real-time speech AI transports.
//!
//! This module provides the abstractions the call pipeline uses to talk to a
//! conversational speech endpoint, plus the Voice Live implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use voice_call_gateway::core::realtime::{SpeechConnector, VoiceLiveConfig, VoiceLiveConnector};
//!
//! let connector = VoiceLiveConnector::new(VoiceLiveConfig::new(endpoint, api_key))?;
//! let mut connection = connector.connect("call-123").await?;
//! while let Some(event) = connection.events.recv().await {
//!     println!("{}", event.event_type());
//! }
//! ```

mod base;
pub mod messages;
pub mod voice_live;

pub use base::{
    ConnectionState, RealtimeError, RealtimeResult, SpeechConnection, SpeechConnector,
    SpeechTransport,
};
pub use messages::{ClientEvent, ServerEvent, SessionConfig};
pub use voice_live::{VoiceLiveConfig, VoiceLiveConnector, VoiceLiveTransport};
