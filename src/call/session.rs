//! Per-call record owned by the orchestrator.

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use super::state::{CallState, CallTrigger, TransitionError, transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone)]
pub struct CallSession {
    /// Platform call connection id; unknown until answer/create returns
    pub call_id: Option<String>,
    /// Gateway-assigned id routing callbacks and the media WebSocket
    pub correlation_id: String,
    /// The platform's own correlation id, for logs
    pub platform_correlation_id: Option<String>,
    state: CallState,
    pub participant_address: Option<String>,
    pub direction: CallDirection,
    pub created_at: OffsetDateTime,
    pub context_payload: Option<Value>,
    pub persona: Option<String>,
    /// Set once the fallback announcement has been started
    pub degraded: bool,
}

impl CallSession {
    pub fn new(direction: CallDirection, participant_address: Option<String>) -> Self {
        Self {
            call_id: None,
            correlation_id: Uuid::new_v4().to_string(),
            platform_correlation_id: None,
            state: CallState::Idle,
            participant_address,
            direction,
            created_at: OffsetDateTime::now_utc(),
            context_payload: None,
            persona: None,
            degraded: false,
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Apply a trigger, returning the new state.
    pub fn apply(&mut self, trigger: CallTrigger) -> Result<CallState, TransitionError> {
        self.state = transition(self.state, trigger)?;
        Ok(self.state)
    }

    /// Call id if known, else the correlation id.
    pub fn log_id(&self) -> &str {
        self.call_id.as_deref().unwrap_or(&self.correlation_id)
    }
}
