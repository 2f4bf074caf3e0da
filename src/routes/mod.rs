pub mod api;
pub mod media;
pub mod webhooks;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// All gateway routes, before state is attached.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(api::create_api_router())
        .merge(webhooks::create_webhook_router())
        .merge(media::create_media_router())
}
