//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        // Dedup check and committed media
        .route("/v1/media", post(handlers::upload_media))
        .route("/v1/media/{digest}", get(handlers::get_media))
        .route("/v1/media/{digest}/exists", get(handlers::check_media_exists))
        .route("/v1/media/{digest}/url", get(handlers::get_preview_url))
        // Chunked upload
        .route(
            "/v1/uploads/{digest}/chunks/{index}",
            get(handlers::check_chunk).put(handlers::upload_chunk),
        )
        .route("/v1/uploads/{digest}/merge", post(handlers::merge_upload))
        // Staging administration
        .route("/v1/admin/staging/stats", get(handlers::staging_stats))
        .route("/v1/admin/staging/cleanup", post(handlers::trigger_cleanup))
        .route("/v1/admin/staging/sweeps", get(handlers::list_sweeps));

    let mut router = Router::new().merge(api_routes);

    // The metrics endpoint is unauthenticated; restrict it at the network edge.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
