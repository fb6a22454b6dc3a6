use axum::Json;

use crate::api::HealthResponse;
use crate::build_info;

/// GET /health - unauthenticated liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: build_info::VERSION,
    })
}
