//! Unified error types for the crate.

use std::path::PathBuf;

use ai_llm_service::AiLlmError;
use thiserror::Error;

/// Top-level error for rag-store operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Knowledge base artifacts could not be loaded.
    #[error(transparent)]
    KnowledgeBase(#[from] KnowledgeBaseError),

    /// Embedding provider failed (transport, status, decode).
    #[error("embedding error: {0}")]
    Embedding(#[from] AiLlmError),

    /// Query vector does not match the index (or configured) dimensionality.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Blocking load task panicked or was cancelled.
    #[error("knowledge base load task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl RagError {
    /// `true` when the knowledge base itself is unusable, as opposed to a
    /// per-request embedding or search failure.
    pub fn is_knowledge_base_unavailable(&self) -> bool {
        matches!(self, RagError::KnowledgeBase(_))
    }
}

/// Why the knowledge base (index + chunks) is unavailable.
#[derive(Debug, Error)]
pub enum KnowledgeBaseError {
    /// Artifact file does not exist.
    #[error("knowledge base artifact not found: {path:?}")]
    Missing { path: PathBuf },

    /// Artifact exists but could not be read.
    #[error("cannot read {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact content is malformed.
    #[error("corrupt artifact {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Vector count and chunk count disagree.
    #[error("index holds {vectors} vectors but chunk store holds {chunks} chunks")]
    Misaligned { vectors: usize, chunks: usize },

    /// Artifact format is known but not supported (e.g. a pickle file).
    #[error("unsupported artifact {path:?}: {reason}")]
    Unsupported { path: PathBuf, reason: String },
}

impl KnowledgeBaseError {
    pub(crate) fn corrupt(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Maps an I/O failure while opening `path`, distinguishing "not found".
    pub(crate) fn from_io(path: &std::path::Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::Missing {
                path: path.to_path_buf(),
            }
        } else {
            Self::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}
