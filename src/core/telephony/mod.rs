//! Telephony platform integration.
//!
//! - [`CallAutomation`]: call-control operations (answer, create, play, hang up)
//! - [`frames`]: the media WebSocket frame envelope
//! - [`events`]: Event Grid and callback webhook payloads
//! - [`acs`]: Azure Communication Services REST implementation

pub mod acs;
mod base;
pub mod events;
pub mod frames;
pub mod models;

pub use acs::{AcsCallAutomationClient, DEFAULT_ACS_API_VERSION};
pub use base::{CallAutomation, TelephonyError, TelephonyResult};
pub use frames::{AudioFrame, FrameError, InboundFrame, OutboundFrame};
pub use models::{
    AnswerCallRequest, AudioFormat, CallConnectionProperties, CallIntelligenceOptions,
    CommunicationIdentifier, CreateCallRequest, MediaStreamingOptions, PhoneNumber,
    PlayTextRequest,
};
