use std::{sync::Arc, time::Instant};

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use tracing::{info, warn};

use crate::{
    core::{app_state::AppState, http::response_envelope::ChatResponse},
    error_handler::AppResult,
    middleware_layer::request_id::RequestId,
    routes::chat::chat_request::ChatRequest,
};

/// `POST /api/chat`
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Json<ChatResponse>> {
    let Json(req) = payload?;
    let query = req.query.unwrap_or_default();

    info!(
        request_id = %request_id.0,
        thread_id = req.thread_id.as_deref().unwrap_or("-"),
        query_len = query.len(),
        "chat request"
    );

    let started = Instant::now();
    let result = state
        .pipeline
        .handle_chat(&query, req.thread_id.as_deref())
        .await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(response) => {
            info!(request_id = %request_id.0, latency_ms, "chat answered");
            Ok(Json(ChatResponse { response }))
        }
        Err(e) => {
            warn!(request_id = %request_id.0, latency_ms, error = %e, "chat failed");
            Err(e.into())
        }
    }
}
