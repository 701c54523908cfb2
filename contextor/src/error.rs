//! Typed error for the contextor crate.

use rag_store::RagError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextorError {
    /// Caller input is unusable (e.g. empty query).
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    /// Index or chunk store is missing, unreadable or inconsistent.
    #[error("knowledge base unavailable: {0}")]
    KnowledgeBaseUnavailable(#[source] RagError),

    /// Retrieval failed under the `fail` policy.
    #[error("retrieval error: {0}")]
    Retrieval(#[source] RagError),

    /// Invalid configuration or persona file.
    #[error("config error: {0}")]
    Config(String),
}

impl From<RagError> for ContextorError {
    fn from(e: RagError) -> Self {
        if e.is_knowledge_base_unavailable() {
            ContextorError::KnowledgeBaseUnavailable(e)
        } else {
            ContextorError::Retrieval(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_store::KnowledgeBaseError;

    #[test]
    fn rag_errors_split_into_unavailable_and_retrieval() {
        let kb = RagError::from(KnowledgeBaseError::Misaligned {
            vectors: 2,
            chunks: 1,
        });
        assert!(matches!(
            ContextorError::from(kb),
            ContextorError::KnowledgeBaseUnavailable(_)
        ));

        let dim = RagError::VectorSizeMismatch { got: 1, want: 2 };
        assert!(matches!(
            ContextorError::from(dim),
            ContextorError::Retrieval(_)
        ));
    }
}
