//! Base trait and error types for the call-control platform.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{
    AnswerCallRequest, CallConnectionProperties, CreateCallRequest, PlayTextRequest,
};

// =============================================================================
// Error Types
// =============================================================================

/// Errors returned by call-control operations.
#[derive(Debug, Error)]
pub enum TelephonyError {
    /// The connection string is missing a part or is malformed
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// The request never produced a response
    #[error("Request failed: {0}")]
    Request(String),

    /// The platform answered with a non-success status
    #[error("Platform returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result type for call-control operations.
pub type TelephonyResult<T> = Result<T, TelephonyError>;

// =============================================================================
// Call Automation Trait
// =============================================================================

/// Operations the gateway needs from the call-control platform.
#[async_trait]
pub trait CallAutomation: Send + Sync {
    /// Answer an incoming call with bidirectional media streaming.
    async fn answer_call(&self, request: &AnswerCallRequest)
    -> TelephonyResult<CallConnectionProperties>;

    /// Place an outbound call with bidirectional media streaming.
    async fn create_call(&self, request: &CreateCallRequest)
    -> TelephonyResult<CallConnectionProperties>;

    /// Play a text-to-speech announcement to every participant.
    async fn play_text(&self, call_id: &str, request: &PlayTextRequest) -> TelephonyResult<()>;

    /// Leave the call.
    async fn hang_up(&self, call_id: &str) -> TelephonyResult<()>;
}
