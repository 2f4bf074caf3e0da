//! Outcome signals sent from per-call tasks to the orchestrator.
//!
//! Bridge and speech tasks never tear a call down themselves; they report what
//! happened and the orchestrator's control loop decides.

use tokio::sync::mpsc;

/// Something a per-call task observed that may end or degrade the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallSignal {
    /// The speech session's event stream ended. `error` is set when the
    /// endpoint reported a session-fatal error.
    SpeechEnded {
        call_id: String,
        error: Option<String>,
    },
    /// Writing to the telephony transport failed.
    BridgeFailed { call_id: String, reason: String },
    /// The telephony transport closed or errored.
    TransportClosed { call_id: String },
}

impl CallSignal {
    pub fn call_id(&self) -> &str {
        match self {
            CallSignal::SpeechEnded { call_id, .. }
            | CallSignal::BridgeFailed { call_id, .. }
            | CallSignal::TransportClosed { call_id } => call_id,
        }
    }
}

pub type SignalSender = mpsc::UnboundedSender<CallSignal>;
pub type SignalReceiver = mpsc::UnboundedReceiver<CallSignal>;

pub fn signal_channel() -> (SignalSender, SignalReceiver) {
    mpsc::unbounded_channel()
}
