//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use musicspot_core::MAX_UPLOAD_BYTES;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and text fields around the largest accepted file.
const MULTIPART_ENVELOPE_BYTES: u64 = 1024 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let upload_limit = (MAX_UPLOAD_BYTES + MULTIPART_ENVELOPE_BYTES) as usize;

    let song_routes = Router::new()
        .route(
            "/songs/upload",
            post(handlers::upload_song).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/songs/stream/{asset_id}", get(handlers::stream_asset))
        .route("/songs/delete/{song_id}", post(handlers::delete_song))
        .route("/songs/edit/{song_id}", post(handlers::edit_song))
        .route("/songs/{song_id}", get(handlers::get_song))
        .route("/songs/{song_id}/stream", get(handlers::stream_song))
        .route("/songs", get(handlers::list_songs));

    let mut router = Router::new()
        // Unauthenticated for load balancers and probes
        .route("/health", get(handlers::health_check))
        .merge(song_routes);

    // Must be network-restricted when enabled; see crate::metrics.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
