//! Azure Voice Live speech transport.
//!
//! Voice Live speaks the Realtime event protocol over a WebSocket at
//! `{endpoint}/voice-live/realtime`, authenticated with an `api-key` header.
//! Audio is PCM 16-bit mono, base64 encoded.

mod client;
mod config;

pub use client::{VoiceLiveConnector, VoiceLiveTransport};
pub use config::{DEFAULT_VOICE_LIVE_API_VERSION, DEFAULT_VOICE_LIVE_MODEL, VoiceLiveConfig};
