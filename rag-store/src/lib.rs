//! High-level RAG facade: read-only knowledge base + top-K retrieval.
//!
//! This crate provides a clean API to:
//! - Load a flat vector index (FAISS `IndexFlatL2`/`IndexFlatIP` or JSON)
//!   together with its position-aligned chunk store
//! - Embed a query through an [`EmbeddingsProvider`] and return the nearest chunks
//!
//! The design is flat (no deep nesting) and splits responsibilities into focused modules.

mod chunk_store;
mod config;
mod embed;
mod errors;
mod index;
mod knowledge_base;
mod record;
mod retrieve;

pub use chunk_store::ChunkStore;
pub use config::{RagConfig, RetrievalFailurePolicy};
pub use embed::llm_embedder::LlmEmbedder;
pub use embed::static_embedder::StaticEmbedder;
pub use embed::{EmbedFuture, EmbeddingsProvider};
pub use errors::{KnowledgeBaseError, RagError};
pub use index::{Metric, VectorIndex};
pub use knowledge_base::{KnowledgeBase, KnowledgeBaseHandle};
pub use record::{Neighbor, RetrievedChunk};
pub use retrieve::Retriever;

use std::sync::Arc;

use tracing::trace;

/// High-level facade that wires configuration, knowledge base and embedder.
///
/// This is the single entry point recommended for application code.
#[derive(Clone)]
pub struct RagStore {
    cfg: RagConfig,
    retriever: Retriever,
}

impl RagStore {
    /// Constructs a store over the artifacts named in `cfg`.
    ///
    /// Nothing is read from disk until the first retrieval (or [`RagStore::preload`]).
    ///
    /// # Errors
    /// Returns `RagError::Config` if the configuration is invalid.
    pub fn new(cfg: RagConfig, embedder: Arc<dyn EmbeddingsProvider>) -> Result<Self, RagError> {
        cfg.validate()?;
        trace!("RagStore::new index={:?} chunks={:?}", cfg.index_path, cfg.chunks_path);
        let kb = Arc::new(KnowledgeBaseHandle::new(&cfg.index_path, &cfg.chunks_path));
        let retriever = Retriever::new(kb, embedder, cfg.on_embed_failure);
        Ok(Self { cfg, retriever })
    }

    /// Retrieves the configured `top_k` chunks for `query`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, RagError> {
        self.retriever.retrieve(query, self.cfg.top_k).await
    }

    /// Loads the knowledge base now instead of on the first query.
    pub async fn preload(&self) -> Result<(), RagError> {
        self.retriever.knowledge_base().snapshot().await.map(|_| ())
    }

    /// Re-reads the artifacts and swaps them in atomically.
    pub async fn reload(&self) -> Result<(), RagError> {
        self.retriever.knowledge_base().reload().await.map(|_| ())
    }
}
