//! Chat model seam used by the response generator.

use std::{future::Future, pin::Pin};

use ai_llm_service::{AiLlmError, ChatMessage, LlmServiceProfiles};

/// Boxed future returned by [`ChatModel::chat`].
pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AiLlmError>> + Send + 'a>>;

/// Anything that turns a message list into one assistant reply.
///
/// Implemented for [`LlmServiceProfiles`] (hosted providers); tests plug in
/// their own implementations.
pub trait ChatModel: Send + Sync {
    fn chat<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a>;
}

impl ChatModel for LlmServiceProfiles {
    fn chat<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a> {
        Box::pin(LlmServiceProfiles::chat(self, messages))
    }
}
