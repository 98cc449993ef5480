//! Router assembly.
//!
//! Three surfaces: the health endpoint, the media-stream WebSocket, and
//! the hosted clips used by redirect playback.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers::{get_clip, health_check, media_handler};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/media", get(media_handler))
        .route("/clips/{id}", get(get_clip))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
