//! Axum handler for the metrics endpoint.

use crate::api::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

/// GET /metrics - Prometheus text format.
///
/// Always returns 200, with an empty body if nothing has been recorded yet.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics_handle.render(),
    )
}
