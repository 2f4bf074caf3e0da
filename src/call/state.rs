//! Call lifecycle state machine.
//!
//! ```text
//! Idle --IncomingCall/OutboundCreated--> Answering --CallConnected--> Connected
//!      --MediaStreamingStarted--> Streaming --CallDisconnected--> Ending --TeardownComplete--> Ended
//! ```
//!
//! `CallDisconnected` moves any live state to `Ending`. `Ended` is terminal.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallState {
    #[default]
    Idle,
    Answering,
    Connected,
    Streaming,
    Ending,
    Ended,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::Answering => "answering",
            CallState::Connected => "connected",
            CallState::Streaming => "streaming",
            CallState::Ending => "ending",
            CallState::Ended => "ended",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Ended)
    }

    /// `Ending` or `Ended`.
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, CallState::Ending | CallState::Ended)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs that drive a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTrigger {
    IncomingCall,
    OutboundCreated,
    CallConnected,
    MediaStreamingStarted,
    CallDisconnected,
    TeardownComplete,
}

impl fmt::Display for CallTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallTrigger::IncomingCall => "IncomingCall",
            CallTrigger::OutboundCreated => "OutboundCreated",
            CallTrigger::CallConnected => "CallConnected",
            CallTrigger::MediaStreamingStarted => "MediaStreamingStarted",
            CallTrigger::CallDisconnected => "CallDisconnected",
            CallTrigger::TeardownComplete => "TeardownComplete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from} on {trigger}")]
    InvalidTransition { from: CallState, trigger: CallTrigger },

    #[error("Call has already ended")]
    Terminal,
}

/// Compute the next state, without side effects.
pub fn transition(from: CallState, trigger: CallTrigger) -> Result<CallState, TransitionError> {
    use CallState::*;
    use CallTrigger::*;

    match (from, trigger) {
        (Ended, _) => Err(TransitionError::Terminal),
        (Idle, IncomingCall) | (Idle, OutboundCreated) => Ok(Answering),
        (Answering, CallConnected) => Ok(Connected),
        (Connected, MediaStreamingStarted) => Ok(Streaming),
        (Ending, TeardownComplete) => Ok(Ended),
        (Idle | Answering | Connected | Streaming, CallDisconnected) => Ok(Ending),
        (from, trigger) => Err(TransitionError::InvalidTransition { from, trigger }),
    }
}
