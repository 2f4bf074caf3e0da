use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, outbound};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::banner))
        .route("/health", get(api::health_check))
        .route(
            "/api/initiateOutboundCall",
            post(outbound::initiate_outbound_call),
        )
        .layer(TraceLayer::new_for_http())
}
