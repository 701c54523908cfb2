use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use contextor::ContextorError;
use thiserror::Error;
use tracing::error;

use crate::core::http::response_envelope::ErrorBody;

pub const NO_QUERY: &str = "No query provided";
pub const KNOWLEDGE_BASE_NOT_FOUND: &str = "Knowledge base not found";
pub const INTERNAL: &str = "An error occurred processing your request";

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error("configuration error: {0}")]
    Config(String),

    // --- IO / network / server ---
    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request ---
    #[error("bad request: {0}")]
    BadRequest(&'static str),

    #[error("knowledge base unavailable")]
    KnowledgeBaseUnavailable,

    /// Anything else; details stay in the logs.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::KnowledgeBaseUnavailable
            | AppError::Internal(_)
            | AppError::Config(_)
            | AppError::Bind(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message.
    fn public_message(&self) -> &'static str {
        match self {
            AppError::BadRequest(msg) => *msg,
            AppError::KnowledgeBaseUnavailable => KNOWLEDGE_BASE_NOT_FOUND,
            _ => INTERNAL,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, source = ?std::error::Error::source(&self), "request failed");
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

/// Every unusable body (invalid JSON, wrong types, missing content type) is
/// reported the same way as an empty query.
impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        tracing::debug!(error = %err, "rejected chat body");
        AppError::BadRequest(NO_QUERY)
    }
}

impl From<ContextorError> for AppError {
    fn from(err: ContextorError) -> Self {
        match err {
            ContextorError::InvalidRequest(_) => AppError::BadRequest(NO_QUERY),
            ContextorError::KnowledgeBaseUnavailable(e) => {
                error!(error = %e, "knowledge base unavailable");
                AppError::KnowledgeBaseUnavailable
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}
