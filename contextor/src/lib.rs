//! Persona chat over retrieved context.
//!
//! Public entry point: [`ChatPipeline::handle_chat`]. It validates the query,
//! retrieves top-K chunks through `rag-store`, frames them as
//! `Context: ..\nQuestion: ..\nAnswer:`, sends persona + thread history + that
//! turn to the chat model, and records the exchange in the thread.

mod cfg;
mod conversation;
mod error;
mod generator;
mod llm;
mod persona;
pub mod prompt;

pub use cfg::ContextorConfig;
pub use conversation::{ConversationStore, ThreadId, ThreadLog};
pub use error::ContextorError;
pub use generator::{APOLOGY, ResponseGenerator};
pub use llm::{ChatFuture, ChatModel};
pub use persona::{DEFAULT_PERSONA, load_persona};

use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use rag_store::{LlmEmbedder, RagConfig, RagStore};
use tracing::{debug, info};

/// Request-level orchestration: validation → retrieval → generation.
pub struct ChatPipeline {
    rag: RagStore,
    generator: ResponseGenerator,
    conversations: Arc<ConversationStore>,
    default_thread: ThreadId,
}

impl ChatPipeline {
    /// Wires a pipeline from its parts. Loads the persona once.
    ///
    /// # Errors
    /// [`ContextorError::Config`] for invalid limits, an unreadable persona or a
    /// blank default thread id.
    pub fn new(
        rag: RagStore,
        model: Arc<dyn ChatModel>,
        cfg: &ContextorConfig,
    ) -> Result<Self, ContextorError> {
        cfg.validate()?;
        let persona = load_persona(cfg.persona_path.as_deref())?;
        let default_thread = ThreadId::new(cfg.default_thread_id.as_str())
            .map_err(|_| ContextorError::Config("DEFAULT_THREAD_ID must not be empty".into()))?;
        let conversations = Arc::new(ConversationStore::new(
            cfg.history_max_messages,
            cfg.history_max_threads,
        ));
        let generator = ResponseGenerator::new(
            model,
            persona,
            Arc::clone(&conversations),
            cfg.history_window,
            cfg.generation_timeout,
        );
        Ok(Self {
            rag,
            generator,
            conversations,
            default_thread,
        })
    }

    /// Builds the production pipeline: hosted chat + embeddings from `svc`,
    /// knowledge base and knobs from the environment.
    pub fn from_env(svc: Arc<LlmServiceProfiles>) -> Result<Self, ContextorError> {
        let rag_cfg = RagConfig::from_env().map_err(|e| ContextorError::Config(e.to_string()))?;
        let cfg = ContextorConfig::from_env()?;

        let embedder = Arc::new(LlmEmbedder::new(Arc::clone(&svc), rag_cfg.embedding_dim));
        let rag = RagStore::new(rag_cfg, embedder).map_err(|e| ContextorError::Config(e.to_string()))?;

        info!(
            chat_model = %svc.chat_config().model,
            embedding_model = %svc.embedding_config().model,
            provider = %svc.chat_config().provider,
            "chat pipeline configured"
        );
        Self::new(rag, svc, &cfg)
    }

    /// Answers one user query.
    ///
    /// `thread_id` selects the conversation; `None` or blank uses the
    /// configured default thread.
    ///
    /// # Errors
    /// - [`ContextorError::InvalidRequest`] for an empty query (nothing else runs)
    /// - [`ContextorError::KnowledgeBaseUnavailable`] when the index/chunks cannot be loaded
    /// - [`ContextorError::Retrieval`] when retrieval fails under the `fail` policy
    pub async fn handle_chat(
        &self,
        query: &str,
        thread_id: Option<&str>,
    ) -> Result<String, ContextorError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ContextorError::InvalidRequest("No query provided"));
        }
        let thread = self.resolve_thread(thread_id);

        let chunks = self.rag.retrieve(query).await?;
        debug!(thread_id = %thread, hits = chunks.len(), "context retrieved");

        Ok(self.generator.generate(query, &chunks, &thread).await)
    }

    /// Loads the knowledge base now instead of on the first request.
    pub async fn preload(&self) -> Result<(), ContextorError> {
        Ok(self.rag.preload().await?)
    }

    /// Re-reads the knowledge base artifacts and swaps them in atomically.
    pub async fn reload_knowledge_base(&self) -> Result<(), ContextorError> {
        Ok(self.rag.reload().await?)
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    pub fn default_thread(&self) -> &ThreadId {
        &self.default_thread
    }

    fn resolve_thread(&self, thread_id: Option<&str>) -> ThreadId {
        thread_id
            .and_then(|t| ThreadId::new(t).ok())
            .unwrap_or_else(|| self.default_thread.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_llm_service::{AiLlmError, ChatMessage};
    use rag_store::{RetrievalFailurePolicy, StaticEmbedder};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Echo {
        calls: AtomicUsize,
        fail: bool,
    }

    impl ChatModel for Echo {
        fn chat<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(AiLlmError::Timeout(Duration::from_secs(1)))
                } else {
                    Ok(format!("echo: {last}"))
                }
            })
        }
    }

    fn write_kb(dir: &Path) -> RagConfig {
        let index = dir.join("kb.json");
        let chunks = dir.join("chunks.json");
        std::fs::write(
            &index,
            r#"{"metric":"l2","dim":2,"vectors":[[0,0],[1,1],[9,9]]}"#,
        )
        .unwrap();
        std::fs::write(&chunks, r#"["near", "nearer", "far"]"#).unwrap();
        RagConfig {
            index_path: index,
            chunks_path: chunks,
            top_k: 2,
            embedding_dim: None,
            on_embed_failure: RetrievalFailurePolicy::Degrade,
        }
    }

    fn pipeline(dir: &Path, fail: bool) -> (ChatPipeline, Arc<Echo>, StaticEmbedder) {
        let embedder = StaticEmbedder::constant(vec![1.0, 1.0]);
        let rag = RagStore::new(write_kb(dir), Arc::new(embedder.clone())).unwrap();
        let model = Arc::new(Echo {
            calls: AtomicUsize::new(0),
            fail,
        });
        let p = ChatPipeline::new(rag, model.clone(), &ContextorConfig::default()).unwrap();
        (p, model, embedder)
    }

    #[tokio::test]
    async fn answers_with_retrieved_context() {
        let dir = tempfile::tempdir().unwrap();
        let (p, _, _) = pipeline(dir.path(), false);

        let out = p.handle_chat("what is dharma?", None).await.unwrap();
        assert_eq!(
            out,
            "echo: Context: nearer\nnear\nQuestion: what is dharma?\nAnswer:"
        );
        assert_eq!(p.conversations().history(p.default_thread()).await.len(), 2);
    }

    #[tokio::test]
    async fn empty_query_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (p, model, embedder) = pipeline(dir.path(), false);

        for q in ["", "   \n"] {
            assert!(matches!(
                p.handle_chat(q, None).await,
                Err(ContextorError::InvalidRequest(_))
            ));
        }
        assert_eq!(embedder.calls(), 0);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_chunks_is_knowledge_base_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let (p, model, _) = pipeline(dir.path(), false);
        std::fs::remove_file(dir.path().join("chunks.json")).unwrap();

        assert!(matches!(
            p.handle_chat("q", None).await,
            Err(ContextorError::KnowledgeBaseUnavailable(_))
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn explicit_threads_are_kept_apart() {
        let dir = tempfile::tempdir().unwrap();
        let (p, _, _) = pipeline(dir.path(), false);

        p.handle_chat("one", Some("alice")).await.unwrap();
        p.handle_chat("two", Some("  ")).await.unwrap();

        let alice = ThreadId::new("alice").unwrap();
        assert_eq!(p.conversations().history(&alice).await.len(), 2);
        assert_eq!(p.conversations().history(p.default_thread()).await.len(), 2);
    }

    #[tokio::test]
    async fn reload_picks_up_rewritten_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let (p, _, _) = pipeline(dir.path(), false);
        let chunks = dir.path().join("chunks.json");

        let before = p.handle_chat("q", None).await.unwrap();
        assert!(before.contains("Context: nearer\nnear\n"));

        std::fs::write(&chunks, r#"["calm", "calmer", "storm"]"#).unwrap();
        let cached = p.handle_chat("q", Some("other")).await.unwrap();
        assert!(cached.contains("Context: nearer\nnear\n"));

        p.reload_knowledge_base().await.unwrap();
        let after = p.handle_chat("q", Some("third")).await.unwrap();
        assert!(after.contains("Context: calmer\ncalm\n"));
    }

    #[tokio::test]
    async fn failed_reload_keeps_serving_the_old_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (p, _, _) = pipeline(dir.path(), false);
        p.preload().await.unwrap();

        std::fs::write(dir.path().join("chunks.json"), r#"["only one"]"#).unwrap();
        assert!(matches!(
            p.reload_knowledge_base().await,
            Err(ContextorError::KnowledgeBaseUnavailable(_))
        ));
        assert!(p.handle_chat("q", None).await.unwrap().contains("nearer"));
    }

    #[test]
    fn single_message_cap_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let rag = RagStore::new(
            write_kb(dir.path()),
            Arc::new(StaticEmbedder::constant(vec![1.0, 1.0])),
        )
        .unwrap();
        let model = Arc::new(Echo {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cfg = ContextorConfig {
            history_max_messages: 1,
            ..ContextorConfig::default()
        };
        assert!(matches!(
            ChatPipeline::new(rag, model, &cfg),
            Err(ContextorError::Config(_))
        ));
    }

    #[tokio::test]
    async fn caller_supplied_thread_ids_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let rag = RagStore::new(
            write_kb(dir.path()),
            Arc::new(StaticEmbedder::constant(vec![1.0, 1.0])),
        )
        .unwrap();
        let model = Arc::new(Echo {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cfg = ContextorConfig {
            history_max_threads: 5,
            ..ContextorConfig::default()
        };
        let p = ChatPipeline::new(rag, model, &cfg).unwrap();

        for i in 0..50 {
            p.handle_chat("q", Some(&format!("caller-{i}"))).await.unwrap();
        }
        assert_eq!(p.conversations().len().await, 5);
        let newest = ThreadId::new("caller-49").unwrap();
        assert_eq!(p.conversations().history(&newest).await.len(), 2);
    }

    #[tokio::test]
    async fn generation_failure_is_an_apology_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (p, _, _) = pipeline(dir.path(), true);

        assert_eq!(p.handle_chat("q", None).await.unwrap(), APOLOGY);
        assert!(p.conversations().history(p.default_thread()).await.is_empty());
        assert!(p.conversations().is_empty().await);
    }
}
