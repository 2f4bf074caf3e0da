use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{debug, warn};

use crate::call::CallError;
use crate::core::telephony::events::parse_callback_batch;
use crate::state::AppState;

/// Callback endpoint without a context id; calls are found by `callConnectionId`.
pub async fn callback_handler(State(state): State<Arc<AppState>>, body: Bytes) -> StatusCode {
    accept_callbacks(state, None, &body)
}

/// Callback endpoint carrying the gateway correlation id in the path.
pub async fn context_callback_handler(
    State(state): State<Arc<AppState>>,
    Path(context_id): Path<String>,
    body: Bytes,
) -> StatusCode {
    accept_callbacks(state, Some(context_id), &body)
}

/// Parse the batch and apply it in order on a background task.
fn accept_callbacks(state: Arc<AppState>, context_id: Option<String>, body: &[u8]) -> StatusCode {
    let events = match parse_callback_batch(body) {
        Ok(events) => events,
        Err(e) => {
            warn!(context_id = ?context_id, "Ignoring malformed callback delivery: {}", e);
            return StatusCode::OK;
        }
    };
    if events.is_empty() {
        return StatusCode::OK;
    }

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        for event in events {
            let event_type = event.event_type.clone();
            match orchestrator
                .handle_callback(context_id.as_deref(), event)
                .await
            {
                Ok(()) => {}
                Err(CallError::NotFound(id)) => {
                    debug!(event_type = %event_type, id = %id, "Callback for unknown call");
                }
                Err(e) => warn!(event_type = %event_type, "Callback handling failed: {}", e),
            }
        }
    });

    StatusCode::OK
}
