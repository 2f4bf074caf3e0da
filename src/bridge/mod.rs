//! Per-call audio bridge between the telephony media stream and the speech session.

pub mod audio_bridge;
pub mod relay;
pub mod transport;

pub use audio_bridge::{AudioBridge, BridgeConfig, BridgeStats};
pub use relay::{DEFAULT_OUTBOUND_CAPACITY, OutboundQueue, OutboundRelay, PushOutcome, outbound_channel};
pub use transport::{FrameSink, FrameSource, TelephonyTransport, TransportError, TransportMessage};
