use serde::Serialize;

/// Error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

/// Success body of `POST /api/chat`.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Body of `GET /api/health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
