//! Prompt builder: persona + history window + context-framed user turn.

use ai_llm_service::ChatMessage;
use rag_store::RetrievedChunk;

/// Joins chunk texts in retrieval order with `\n`.
///
/// # Example
/// ```
/// # use contextor::prompt::build_context;
/// assert_eq!(build_context(&[]), "");
/// ```
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Frames the question with its retrieved context.
///
/// # Example
/// ```
/// # use contextor::prompt::build_user_turn;
/// assert_eq!(
///     build_user_turn("a\nb", "q"),
///     "Context: a\nb\nQuestion: q\nAnswer:"
/// );
/// ```
pub fn build_user_turn(context: &str, query: &str) -> String {
    format!("Context: {context}\nQuestion: {query}\nAnswer:")
}

/// Full message list for one model call: system persona, prior turns, new user turn.
pub fn assemble(persona: &str, history: &[ChatMessage], user_turn: &str) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(history.len() + 2);
    out.push(ChatMessage::system(persona));
    out.extend_from_slice(history);
    out.push(ChatMessage::user(user_turn));
    out
}
