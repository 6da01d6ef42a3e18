//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::timeout::request_timeout_middleware;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Liveness only, never touches the database
        .route("/api/health", get(handlers::health_check))
        .route("/api/upload", post(handlers::upload_image))
        .route("/api/images", get(handlers::list_images))
        .route("/api/images/{id}", delete(handlers::delete_image))
        // Older clients delete through POST
        .route("/api/delete/{id}", post(handlers::delete_image))
        .route("/api/random", get(handlers::random_image));

    let file_routes = Router::new().route("/images/{filename}", get(handlers::serve_image));

    let mut router = Router::new().merge(api_routes).merge(file_routes);

    // SECURITY: restrict /metrics to the Prometheus scraper at the network
    // level when the server is publicly reachable.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    let body_limit = state
        .config
        .uploads
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    // Layers wrap outward: TraceLayer -> CORS -> timeout -> body limit -> handler
    router = router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            request_timeout_middleware,
        ));

    if state.config.server.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
