//! Shared LLM service: chat completions and embeddings over hosted providers.
//!
//! - [`service_profiles::LlmServiceProfiles`] is the entry point used by the
//!   rest of the workspace (one **chat** profile, one **embedding** profile).
//! - Provider clients live in [`services`] (Gemini, Ollama, OpenAI).
//! - Configuration is read from the environment via [`config::default_config`].
//! - All failures surface as [`error_handler::AiLlmError`].

pub mod chat_message;
pub mod config;
pub mod error_handler;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use chat_message::{ChatMessage, ChatRole};
pub use config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
pub use error_handler::{AiLlmError, FailureCategory};
pub use service_profiles::LlmServiceProfiles;
