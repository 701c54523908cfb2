use serde::Deserialize;

/// Body of `POST /api/chat`.
///
/// Both fields are optional at the wire level; an absent or blank `query`
/// is rejected by the pipeline, an absent `thread_id` means the default thread.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub query: Option<String>,
    pub thread_id: Option<String>,
}
