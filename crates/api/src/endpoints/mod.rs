//! API endpoints.

pub mod forms;
mod poll;
mod week_status;

use axum::{Router, routing::get};

use crate::middleware::AppState;
use crate::{sse, streaming};

/// Liveness check.
async fn health() -> &'static str {
    "OK"
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/week-status", week_status::router())
        .nest("/poll", poll::router())
        .route("/streaming", get(streaming::streaming_handler))
        .nest("/streaming/sse", sse::router())
}
