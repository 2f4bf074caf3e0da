//! Outbound call initiation.

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State};
use serde_json::Value;
use tracing::info;

use crate::call::OutboundCallInfo;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;
use crate::utils::validate_phone_number;

/// Place a call from the agent number.
///
/// The JSON body is kept as call context for the assistant. `phone_number`
/// names the target (falling back to the configured default) and `persona`
/// optionally selects a prompt template.
pub async fn initiate_outbound_call(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<Json<OutboundCallInfo>> {
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON payload: {e}")))?;
    if !payload.is_object() {
        return Err(AppError::BadRequest(
            "Payload must be a JSON object".to_string(),
        ));
    }

    let target = payload
        .get("phone_number")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| state.config.default_target_phone_number.clone())
        .ok_or_else(|| AppError::BadRequest("No target phone number provided".to_string()))?;
    let target = validate_phone_number(&target)?;

    let persona = payload
        .get("persona")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(name) = &persona
        && !state.orchestrator.speech().catalog().contains(name)
    {
        return Err(AppError::BadRequest(format!("Unknown persona: {name}")));
    }

    let info = state
        .orchestrator
        .initiate_outbound_call(&target, Some(payload), persona)
        .await?;

    info!(
        call_id = %info.call_connection_id,
        correlation_id = %info.correlation_id,
        "Outbound call created"
    );
    Ok(Json(info))
}
