//! Request-level timeout.

use crate::error::ApiError;
use crate::metrics::REQUEST_TIMEOUTS;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Abort requests that run longer than `server.request_timeout_secs`.
///
/// Dropping the inner future cancels pending pool acquisition and disk I/O.
/// Connections checked out by the cancelled request go back to the pool.
pub async fn request_timeout_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let limit = state.config.server.request_timeout();
    let method = req.method().clone();
    let uri = req.uri().clone();

    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            REQUEST_TIMEOUTS.inc();
            tracing::warn!(
                method = %method,
                uri = %uri,
                timeout_secs = limit.as_secs(),
                "Request timed out"
            );
            ApiError::Timeout.into_response()
        }
    }
}
