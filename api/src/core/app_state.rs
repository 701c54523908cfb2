use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use contextor::ChatPipeline;
use tracing::{info, warn};

use crate::error_handler::AppError;

/// Shared state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Retrieval + generation pipeline (owns conversations and knowledge base).
    pub pipeline: Arc<ChatPipeline>,
}

impl AppState {
    pub fn new(pipeline: ChatPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Load shared state from environment variables.
    ///
    /// The knowledge base is loaded eagerly when possible; if it is not
    /// there yet the server still starts and reports it per request.
    pub async fn from_env() -> Result<Self, AppError> {
        let svc = LlmServiceProfiles::from_env().map_err(|e| AppError::Config(e.to_string()))?;
        let pipeline =
            ChatPipeline::from_env(Arc::new(svc)).map_err(|e| AppError::Config(e.to_string()))?;

        match pipeline.preload().await {
            Ok(()) => info!("knowledge base ready"),
            Err(e) => warn!(error = %e, "knowledge base not loaded at startup; will retry per request"),
        }
        Ok(Self::new(pipeline))
    }
}
