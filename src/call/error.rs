use thiserror::Error;

use super::state::TransitionError;
use crate::core::realtime::RealtimeError;
use crate::core::store::StoreError;
use crate::core::telephony::TelephonyError;

/// Errors surfaced by the call orchestrator.
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Telephony(#[from] TelephonyError),

    #[error(transparent)]
    Speech(#[from] RealtimeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Call not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type CallResult<T> = Result<T, CallError>;
