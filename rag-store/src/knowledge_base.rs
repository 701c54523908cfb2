//! Paired (index, chunks) snapshot and its lazily loaded, swappable handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tokio::task;
use tracing::{info, warn};

use crate::chunk_store::ChunkStore;
use crate::errors::{KnowledgeBaseError, RagError};
use crate::index::VectorIndex;

/// Immutable knowledge base: vector *i* belongs to chunk *i*.
#[derive(Debug)]
pub struct KnowledgeBase {
    index: VectorIndex,
    chunks: ChunkStore,
}

impl KnowledgeBase {
    /// Pairs an index with its chunks.
    ///
    /// # Errors
    /// [`KnowledgeBaseError::Misaligned`] when the counts differ.
    pub fn new(index: VectorIndex, chunks: ChunkStore) -> Result<Self, RagError> {
        if index.len() != chunks.len() {
            return Err(KnowledgeBaseError::Misaligned {
                vectors: index.len(),
                chunks: chunks.len(),
            }
            .into());
        }
        Ok(Self { index, chunks })
    }

    /// Reads both artifacts from disk. Missing files are reported before any
    /// parsing so an absent chunk store is never masked by an index error.
    pub fn load(index_path: &Path, chunks_path: &Path) -> Result<Self, RagError> {
        for path in [index_path, chunks_path] {
            if !path.exists() {
                return Err(KnowledgeBaseError::Missing {
                    path: path.to_path_buf(),
                }
                .into());
            }
        }
        let index = VectorIndex::load(index_path)?;
        let chunks = ChunkStore::load(chunks_path)?;
        Self::new(index, chunks)
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }
}

/// Shared handle that loads the knowledge base on first use and can swap in
/// a fresh snapshot without disturbing readers holding the old one.
#[derive(Debug)]
pub struct KnowledgeBaseHandle {
    index_path: PathBuf,
    chunks_path: PathBuf,
    current: RwLock<Option<Arc<KnowledgeBase>>>,
}

impl KnowledgeBaseHandle {
    /// Handle over on-disk artifacts; nothing is read until [`Self::snapshot`].
    pub fn new(index_path: impl Into<PathBuf>, chunks_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            chunks_path: chunks_path.into(),
            current: RwLock::new(None),
        }
    }

    /// Current snapshot, loading it if needed.
    ///
    /// A failed load is not cached; the next call tries again.
    pub async fn snapshot(&self) -> Result<Arc<KnowledgeBase>, RagError> {
        if let Some(kb) = self.current.read().await.as_ref() {
            return Ok(Arc::clone(kb));
        }

        let mut slot = self.current.write().await;
        if let Some(kb) = slot.as_ref() {
            return Ok(Arc::clone(kb));
        }
        let kb = Arc::new(self.load().await?);
        *slot = Some(Arc::clone(&kb));
        Ok(kb)
    }

    /// Re-reads both artifacts and swaps them in atomically.
    ///
    /// On failure the previous snapshot (if any) stays active.
    pub async fn reload(&self) -> Result<Arc<KnowledgeBase>, RagError> {
        let kb = Arc::new(self.load().await?);
        *self.current.write().await = Some(Arc::clone(&kb));
        info!(vectors = kb.index().len(), "knowledge base reloaded");
        Ok(kb)
    }

    /// File reads and parsing run on the blocking pool.
    async fn load(&self) -> Result<KnowledgeBase, RagError> {
        let started = Instant::now();
        let (index_path, chunks_path) = (self.index_path.clone(), self.chunks_path.clone());
        let loaded =
            task::spawn_blocking(move || KnowledgeBase::load(&index_path, &chunks_path)).await?;
        match loaded {
            Ok(kb) => {
                info!(
                    index = ?self.index_path,
                    chunks = ?self.chunks_path,
                    vectors = kb.index().len(),
                    dim = kb.index().dim(),
                    latency_ms = started.elapsed().as_millis(),
                    "knowledge base loaded"
                );
                Ok(kb)
            }
            Err(e) => {
                warn!(error = %e, "knowledge base unavailable");
                Err(e)
            }
        }
    }
}
