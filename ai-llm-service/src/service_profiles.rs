//! Shared LLM service with two active profiles: `chat` and `embedding`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Caches underlying HTTP clients per config (provider+endpoint+model+key+timeout).
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use ai_llm_service::{ChatMessage, LlmServiceProfiles};
//!
//! # async fn run() -> Result<(), ai_llm_service::AiLlmError> {
//! let svc = Arc::new(LlmServiceProfiles::from_env()?);
//!
//! let txt = svc.chat(&[ChatMessage::user("Hello")]).await?;
//! println!("CHAT: {txt}");
//!
//! let emb = svc.embed_one("Ferris").await?;
//! println!("Embedding dim = {}", emb.len());
//! # Ok(())
//! # }
//! ```

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    chat_message::ChatMessage,
    config::{
        default_config::{config_chat, config_embedding},
        llm_model_config::LlmModelConfig,
        llm_provider::LlmProvider,
    },
    error_handler::AiLlmError,
    services::{
        gemini_service::GeminiService, ollama_service::OllamaService,
        open_ai_service::OpenAiService,
    },
};

/// Shared service that manages the **chat** and **embedding** profiles.
pub struct LlmServiceProfiles {
    chat: LlmModelConfig,
    embedding: LlmModelConfig,
    clients: RwLock<HashMap<ClientKey, ProviderClient>>,
}

/// One constructed provider client.
#[derive(Clone)]
enum ProviderClient {
    Gemini(Arc<GeminiService>),
    Ollama(Arc<OllamaService>),
    OpenAI(Arc<OpenAiService>),
}

impl ProviderClient {
    fn build(cfg: &LlmModelConfig) -> Result<Self, AiLlmError> {
        Ok(match cfg.provider {
            LlmProvider::Gemini => Self::Gemini(Arc::new(GeminiService::new(cfg.clone())?)),
            LlmProvider::Ollama => Self::Ollama(Arc::new(OllamaService::new(cfg.clone())?)),
            LlmProvider::OpenAI => Self::OpenAI(Arc::new(OpenAiService::new(cfg.clone())?)),
        })
    }
}

impl LlmServiceProfiles {
    /// Creates a new service from explicit profiles.
    ///
    /// Clients are built lazily on first use, so this never performs I/O.
    pub fn new(chat: LlmModelConfig, embedding: LlmModelConfig) -> Self {
        Self {
            chat,
            embedding,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Builds both profiles from the process environment.
    ///
    /// # Errors
    /// Returns [`AiLlmError::Config`] when a required variable is missing or invalid.
    pub fn from_env() -> Result<Self, AiLlmError> {
        Ok(Self::new(config_chat()?, config_embedding()?))
    }

    /// Runs one chat completion with the **chat** profile.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        match self.client(&self.chat).await? {
            ProviderClient::Gemini(cli) => cli.chat(messages).await,
            ProviderClient::Ollama(cli) => cli.chat(messages).await,
            ProviderClient::OpenAI(cli) => cli.chat(messages).await,
        }
    }

    /// Embeds one text with the **embedding** profile.
    pub async fn embed_one(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        match self.client(&self.embedding).await? {
            ProviderClient::Gemini(cli) => cli.embed_one(input).await,
            ProviderClient::Ollama(cli) => cli.embed_one(input).await,
            ProviderClient::OpenAI(cli) => cli.embed_one(input).await,
        }
    }

    /// Embeds many texts with the **embedding** profile, preserving order.
    pub async fn embed_many(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        match self.client(&self.embedding).await? {
            ProviderClient::Gemini(cli) => cli.embed_many(inputs).await,
            ProviderClient::Ollama(cli) => cli.embed_many(inputs).await,
            ProviderClient::OpenAI(cli) => cli.embed_many(inputs).await,
        }
    }

    /// Chat profile in use.
    pub fn chat_config(&self) -> &LlmModelConfig {
        &self.chat
    }

    /// Embedding profile in use.
    pub fn embedding_config(&self) -> &LlmModelConfig {
        &self.embedding
    }

    /* --------------------- Internals --------------------- */

    async fn client(&self, cfg: &LlmModelConfig) -> Result<ProviderClient, AiLlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.clients.read().await.get(&key).cloned() {
            return Ok(cli);
        }

        let mut w = self.clients.write().await;
        if let Some(cli) = w.get(&key).cloned() {
            return Ok(cli);
        }
        let cli = ProviderClient::build(cfg)?;
        debug!(provider = %cfg.provider, model = %cfg.model, "provider client cached");
        w.insert(key, cli.clone());
        Ok(cli)
    }
}

/// Internal cache key to identify unique client configs.
#[derive(Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Option<u64>,
}

impl From<&LlmModelConfig> for ClientKey {
    fn from(cfg: &LlmModelConfig) -> Self {
        Self {
            provider: cfg.provider,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            timeout: cfg.timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ollama(endpoint: &str, model: &str) -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: model.into(),
            endpoint: endpoint.into(),
            api_key: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout_secs: Some(5),
        }
    }

    #[tokio::test]
    async fn routes_chat_and_embeddings_to_their_profiles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": { "role": "assistant", "content": "hi" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [[0.5, 0.5]]
            })))
            .mount(&server)
            .await;

        let svc = LlmServiceProfiles::new(
            ollama(&server.uri(), "chat-model"),
            ollama(&server.uri(), "embed-model"),
        );
        assert_eq!(svc.chat(&[ChatMessage::user("q")]).await.unwrap(), "hi");
        assert_eq!(svc.embed_one("q").await.unwrap(), vec![0.5, 0.5]);
        assert_eq!(svc.clients.read().await.len(), 2);
    }

    #[tokio::test]
    async fn client_errors_propagate_instead_of_panicking() {
        let mut bad = ollama("not-a-url", "m");
        bad.provider = LlmProvider::Gemini;
        let svc = LlmServiceProfiles::new(bad.clone(), bad);
        assert!(svc.embed_one("q").await.is_err());
        assert!(svc.clients.read().await.is_empty());
    }
}
