use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embed::{EmbedFuture, EmbeddingsProvider};
use crate::errors::RagError;

/// In-memory embedder: known texts map to fixed vectors, everything else
/// gets the fallback (or an error when there is none).
///
/// Useful for offline runs and tests; counts how often it was called.
#[derive(Clone, Default)]
pub struct StaticEmbedder {
    table: HashMap<String, Vec<f32>>,
    fallback: Option<Vec<f32>>,
    calls: Arc<AtomicUsize>,
}

impl StaticEmbedder {
    /// Every text embeds to `v`.
    pub fn constant(v: Vec<f32>) -> Self {
        Self {
            fallback: Some(v),
            ..Self::default()
        }
    }

    /// Embedder that always fails, like an unreachable provider.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: impl Into<String>, v: Vec<f32>) -> Self {
        self.table.insert(text.into(), v);
        self
    }

    /// Number of `embed_one` / `embed_many` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.table
            .get(text)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| RagError::Config(format!("no static embedding for `{text}`")))
    }
}

impl EmbeddingsProvider for StaticEmbedder {
    fn embed_one<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { self.lookup(text) })
    }

    fn embed_many<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { texts.iter().map(|t| self.lookup(t)).collect() })
    }
}
