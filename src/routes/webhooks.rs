use axum::{Router, routing::post};
use tower_http::trace::TraceLayer;

use crate::handlers::webhooks;
use crate::state::AppState;
use std::sync::Arc;

/// Create the router for platform webhooks
pub fn create_webhook_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/incomingCall", post(webhooks::incoming_call_handler))
        .route("/api/callbacks", post(webhooks::callback_handler))
        .route(
            "/api/callbacks/{context_id}",
            post(webhooks::context_callback_handler),
        )
        .layer(TraceLayer::new_for_http())
}
