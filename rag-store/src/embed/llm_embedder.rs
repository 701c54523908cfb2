//! Embedding provider backed by the shared LLM service.
//!
//! Delegates to the embedding profile of [`LlmServiceProfiles`], so the
//! backend (Gemini, Ollama, OpenAI) follows `LLM_PROVIDER`.

use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use tracing::{debug, warn};

use crate::embed::{EmbedFuture, EmbeddingsProvider};
use crate::errors::RagError;

/// Async embedder over [`LlmServiceProfiles`].
#[derive(Clone)]
pub struct LlmEmbedder {
    svc: Arc<LlmServiceProfiles>,
    /// Expected embedding dimension, if known.
    dim: Option<usize>,
}

impl LlmEmbedder {
    pub fn new(svc: Arc<LlmServiceProfiles>, dim: Option<usize>) -> Self {
        Self { svc, dim }
    }

    fn check(&self, v: &[f32]) -> Result<(), RagError> {
        match self.dim {
            Some(want) if v.len() != want => {
                warn!(got = v.len(), want, "embedding dimension mismatch");
                Err(RagError::VectorSizeMismatch { got: v.len(), want })
            }
            _ if v.is_empty() => Err(RagError::VectorSizeMismatch { got: 0, want: 1 }),
            _ => Ok(()),
        }
    }
}

impl EmbeddingsProvider for LlmEmbedder {
    fn embed_one<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>> {
        Box::pin(async move {
            let v = self.svc.embed_one(text).await?;
            self.check(&v)?;
            debug!(dim = v.len(), "query embedded");
            Ok(v)
        })
    }

    fn embed_many<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>> {
        Box::pin(async move {
            let out = self.svc.embed_many(texts).await?;
            for v in &out {
                self.check(v)?;
            }
            Ok(out)
        })
    }
}
