//! Response generator: one model call per turn, history updated only on success.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ai_llm_service::{AiLlmError, ChatMessage};
use rag_store::RetrievedChunk;
use tracing::{error, info};

use crate::conversation::{ConversationStore, ThreadId};
use crate::llm::ChatModel;
use crate::prompt;

/// Returned to the user whenever generation fails.
pub const APOLOGY: &str =
    "I apologize, but I'm having trouble processing your question. Could you please rephrase it?";

pub struct ResponseGenerator {
    model: Arc<dyn ChatModel>,
    persona: Arc<str>,
    conversations: Arc<ConversationStore>,
    history_window: usize,
    timeout: Duration,
}

impl ResponseGenerator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        persona: impl Into<Arc<str>>,
        conversations: Arc<ConversationStore>,
        history_window: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            model,
            persona: persona.into(),
            conversations,
            history_window,
            timeout,
        }
    }

    /// Answers `query` from `chunks` within `thread`.
    ///
    /// Never fails: provider errors, timeouts and empty replies yield
    /// [`APOLOGY`] and leave the thread untouched. On success the user turn
    /// and the reply are appended together while the thread lock is held.
    pub async fn generate(&self, query: &str, chunks: &[RetrievedChunk], thread: &ThreadId) -> String {
        let started = Instant::now();
        let context = prompt::build_context(chunks);
        let user_turn = prompt::build_user_turn(&context, query);

        let handle = self.conversations.thread(thread).await;
        let mut log = handle.lock().await;
        let history = log.window(self.history_window);
        let messages = prompt::assemble(&self.persona, &history, &user_turn);

        let Some(reply) = self.call_model(&messages, thread).await else {
            drop(log);
            drop(handle);
            // a first turn that failed leaves no trace of the thread
            self.conversations.discard_if_empty(thread).await;
            return APOLOGY.to_string();
        };

        log.push(ChatMessage::user(user_turn));
        log.push(ChatMessage::assistant(reply.clone()));

        info!(
            thread_id = %thread,
            chunks = chunks.len(),
            history = history.len(),
            latency_ms = started.elapsed().as_millis(),
            "response generated"
        );
        reply
    }

    /// One bounded model call; `None` on error, timeout or blank reply.
    async fn call_model(&self, messages: &[ChatMessage], thread: &ThreadId) -> Option<String> {
        match tokio::time::timeout(self.timeout, self.model.chat(messages)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
            Ok(Ok(_)) => {
                error!(thread_id = %thread, "model returned an empty reply");
                None
            }
            Ok(Err(e)) => {
                error!(
                    thread_id = %thread,
                    category = ?e.category(),
                    error = %e,
                    "generation failed"
                );
                None
            }
            Err(_) => {
                let e = AiLlmError::Timeout(self.timeout);
                error!(thread_id = %thread, error = %e, "generation timed out");
                None
            }
        }
    }
}
