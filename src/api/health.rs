//! Health check endpoint handler.

use crate::api::HealthResponse;
use axum::Json;

/// GET /health - Liveness probe for the hosting platform.
///
/// Reports healthy whenever the process can serve HTTP, including when no
/// credential is configured.
pub async fn handle() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
