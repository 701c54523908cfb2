use crate::errors::RagError;
use std::{future::Future, pin::Pin};

/// Boxed future returned by [`EmbeddingsProvider`] methods.
pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RagError>> + Send + 'a>>;

/// Provider interface for embedding generation.
///
/// Async is required because real providers (Gemini, Ollama, OpenAI)
/// perform HTTP requests. Implement this trait to plug in another backend.
pub trait EmbeddingsProvider: Send + Sync {
    /// Embeds one text with a single provider call.
    fn embed_one<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>>;

    /// Embeds many texts with one batched call.
    ///
    /// The output has the same length and order as `texts`.
    fn embed_many<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>>;
}

pub mod llm_embedder;
pub mod static_embedder;
