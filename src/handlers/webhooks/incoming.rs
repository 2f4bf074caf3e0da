use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::core::telephony::events::{
    GatewayEvent, SUBSCRIPTION_VALIDATION_EVENT, parse_event_grid_batch,
};
use crate::state::AppState;

/// Event Grid delivery endpoint.
///
/// A subscription validation event anywhere in the batch is answered with its
/// validation code and nothing else in the batch is processed. Incoming calls
/// are answered in the background.
pub async fn incoming_call_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let events = match parse_event_grid_batch(&body) {
        Ok(events) => events,
        Err(e) => {
            warn!("Ignoring malformed Event Grid delivery: {}", e);
            return StatusCode::OK.into_response();
        }
    };

    if let Some(validation) = events
        .iter()
        .find(|event| event.event_type == SUBSCRIPTION_VALIDATION_EVENT)
    {
        match validation.classify() {
            Ok(GatewayEvent::SubscriptionValidation { validation_code }) => {
                info!("Answering Event Grid subscription validation");
                return (
                    StatusCode::OK,
                    Json(json!({ "validationResponse": validation_code })),
                )
                    .into_response();
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Invalid subscription validation event: {}", e);
                return StatusCode::OK.into_response();
            }
        }
    }

    for event in events {
        match event.classify() {
            Ok(GatewayEvent::IncomingCall(call)) => {
                state.orchestrator.dispatch_incoming_call(call).await;
            }
            Ok(GatewayEvent::Other(event_type)) => {
                debug!(event_type = %event_type, "Ignoring Event Grid event");
            }
            Ok(GatewayEvent::SubscriptionValidation { .. }) => {}
            Err(e) => warn!("Skipping invalid Event Grid event: {}", e),
        }
    }

    StatusCode::OK.into_response()
}
