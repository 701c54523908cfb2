use axum::Json;

use crate::core::http::response_envelope::HealthResponse;

/// `GET /api/health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
