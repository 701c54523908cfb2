//! Runtime configuration for the knowledge base and retrieval.

use std::path::PathBuf;
use std::str::FromStr;

use ai_llm_service::error_handler::{EnvLookup, opt_var, process_env};

use crate::errors::RagError;

/// Default FAISS index location (relative to the working directory).
pub const DEFAULT_INDEX_PATH: &str = "backend/vector/daily_care.faiss";
/// Default chunk store location.
pub const DEFAULT_CHUNKS_PATH: &str = "backend/chunks/daily_care.json";
/// Default number of chunks per query.
pub const DEFAULT_TOP_K: usize = 3;

/// What to do when the query cannot be embedded or searched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RetrievalFailurePolicy {
    /// Log a warning and continue with no retrieved context.
    #[default]
    Degrade,
    /// Surface the error to the caller.
    Fail,
}

impl FromStr for RetrievalFailurePolicy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degrade" => Ok(Self::Degrade),
            "fail" => Ok(Self::Fail),
            other => Err(RagError::Config(format!(
                "RAG_ON_EMBED_FAILURE must be `degrade` or `fail`, got `{other}`"
            ))),
        }
    }
}

/// Configuration for knowledge base loading and retrieval.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Vector index artifact (`.faiss` or `.json`).
    pub index_path: PathBuf,
    /// Chunk store artifact (`.json` or `.jsonl`).
    pub chunks_path: PathBuf,
    /// Number of chunks returned per query.
    pub top_k: usize,
    /// Expected embedding size, checked on every query vector when set.
    pub embedding_dim: Option<usize>,
    /// Behaviour on embedding/search failures.
    pub on_embed_failure: RetrievalFailurePolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_path: DEFAULT_INDEX_PATH.into(),
            chunks_path: DEFAULT_CHUNKS_PATH.into(),
            top_k: DEFAULT_TOP_K,
            embedding_dim: None,
            on_embed_failure: RetrievalFailurePolicy::Degrade,
        }
    }
}

impl RagConfig {
    /// Reads `RAG_*` and `EMBEDDING_DIM` from the process environment.
    pub fn from_env() -> Result<Self, RagError> {
        Self::from_lookup(&process_env)
    }

    /// Same as [`RagConfig::from_env`] with an explicit variable lookup.
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self, RagError> {
        let mut cfg = Self::default();
        if let Some(p) = opt_var(lookup, "RAG_INDEX_PATH") {
            cfg.index_path = p.into();
        }
        if let Some(p) = opt_var(lookup, "RAG_CHUNKS_PATH") {
            cfg.chunks_path = p.into();
        }
        if let Some(k) = opt_var(lookup, "RAG_TOP_K") {
            cfg.top_k = parse_usize("RAG_TOP_K", &k)?;
        }
        if let Some(d) = opt_var(lookup, "EMBEDDING_DIM") {
            cfg.embedding_dim = Some(parse_usize("EMBEDDING_DIM", &d)?);
        }
        if let Some(p) = opt_var(lookup, "RAG_ON_EMBED_FAILURE") {
            cfg.on_embed_failure = p.parse()?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.index_path.as_os_str().is_empty() {
            return Err(RagError::Config("index_path is empty".into()));
        }
        if self.chunks_path.as_os_str().is_empty() {
            return Err(RagError::Config("chunks_path is empty".into()));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be > 0".into()));
        }
        if self.embedding_dim == Some(0) {
            return Err(RagError::Config("embedding_dim must be > 0".into()));
        }
        Ok(())
    }
}

fn parse_usize(var: &str, value: &str) -> Result<usize, RagError> {
    value
        .parse::<usize>()
        .map_err(|_| RagError::Config(format!("{var} must be a non-negative integer, got `{value}`")))
}
