//! Retrieval: embed the query, search the snapshot, map hits to chunk texts.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::config::RetrievalFailurePolicy;
use crate::embed::EmbeddingsProvider;
use crate::errors::RagError;
use crate::knowledge_base::{KnowledgeBase, KnowledgeBaseHandle};
use crate::record::RetrievedChunk;

/// Top-K retriever over a [`KnowledgeBaseHandle`].
#[derive(Clone)]
pub struct Retriever {
    kb: Arc<KnowledgeBaseHandle>,
    embedder: Arc<dyn EmbeddingsProvider>,
    policy: RetrievalFailurePolicy,
}

impl Retriever {
    pub fn new(
        kb: Arc<KnowledgeBaseHandle>,
        embedder: Arc<dyn EmbeddingsProvider>,
        policy: RetrievalFailurePolicy,
    ) -> Self {
        Self {
            kb,
            embedder,
            policy,
        }
    }

    /// Returns up to `k` chunks nearest to `query`, nearest first.
    ///
    /// # Errors
    /// - [`RagError::KnowledgeBase`] when the knowledge base cannot be loaded,
    ///   regardless of policy.
    /// - Embedding / dimension errors only under [`RetrievalFailurePolicy::Fail`];
    ///   with `Degrade` they are logged and an empty list is returned.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, RagError> {
        trace!("retrieve k={k} query_len={}", query.len());
        let kb = self.kb.snapshot().await?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        match self.search(&kb, query, k).await {
            Ok(hits) => {
                debug!(
                    hits = hits.len(),
                    latency_ms = started.elapsed().as_millis(),
                    "retrieval completed"
                );
                Ok(hits)
            }
            Err(e) => match self.policy {
                RetrievalFailurePolicy::Degrade => {
                    warn!(error = %e, "retrieval failed; continuing without context");
                    Ok(Vec::new())
                }
                RetrievalFailurePolicy::Fail => Err(e),
            },
        }
    }

    /// Direct access to the underlying handle (e.g. to reload).
    pub fn knowledge_base(&self) -> &Arc<KnowledgeBaseHandle> {
        &self.kb
    }

    async fn search(
        &self,
        kb: &KnowledgeBase,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        let qv = self.embedder.embed_one(query).await?;
        let neighbors = kb.index().search(&qv, k)?;

        Ok(neighbors
            .into_iter()
            .filter_map(|n| {
                kb.chunks().get(n.position).map(|text| RetrievedChunk {
                    position: n.position,
                    distance: n.distance,
                    text: text.to_string(),
                })
            })
            .collect())
    }
}
