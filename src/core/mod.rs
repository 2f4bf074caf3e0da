pub mod audio;
pub mod realtime;
pub mod store;
pub mod telephony;

// Re-export commonly used types for convenience
pub use audio::resample_pcm16;

pub use realtime::{
    ClientEvent, RealtimeError, RealtimeResult, ServerEvent, SpeechConnection, SpeechConnector,
    SpeechTransport, VoiceLiveConfig, VoiceLiveConnector,
};

pub use store::{MemorySessionStore, SessionStore, StoreError, StoreResult};

pub use telephony::{
    AcsCallAutomationClient, CallAutomation, InboundFrame, OutboundFrame, TelephonyError,
    TelephonyResult,
};
