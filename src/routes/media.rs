use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::media_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media WebSocket router
pub fn create_media_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/{context_id}", get(media_handler))
        .layer(TraceLayer::new_for_http())
}
