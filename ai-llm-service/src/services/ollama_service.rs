//! Lightweight Ollama service for chat and embeddings.
//!
//! This module implements a thin client for the Ollama API:
//! - `POST {endpoint}/api/chat`  : chat completion (`stream=false`)
//! - `POST {endpoint}/api/embed` : embeddings for one or many inputs
//!
//! It uses the universal configuration [`LlmModelConfig`] and ensures
//! that the selected provider is [`LlmProvider::Ollama`].

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    chat_message::ChatMessage,
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ProviderError, ProviderErrorKind, check_endpoint, status_error,
    },
};

/// Thin client for Ollama.
///
/// Initialized with a full [`LlmModelConfig`]. Reuses an HTTP client with
/// a configurable timeout.
#[derive(Debug)]
pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    url_embed: String,
}

impl OllamaService {
    /// Creates a new [`OllamaService`] from the given config.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not `Ollama`
    /// - `InvalidEndpoint` if `cfg.endpoint` is invalid
    /// - [`AiLlmError::HttpTransport`] if HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(
                ProviderError::new(LlmProvider::Ollama, ProviderErrorKind::InvalidProvider).into(),
            );
        }
        check_endpoint(LlmProvider::Ollama, &cfg.endpoint)?;

        let client = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .gzip(true)
            .brotli(true)
            .build()?;

        let base = cfg.base_url().to_string();
        Ok(Self {
            client,
            url_chat: format!("{base}/api/chat"),
            url_embed: format!("{base}/api/embed"),
            cfg,
        })
    }

    /// Performs a **non-streaming** chat request via `/api/chat`.
    ///
    /// Mapped options:
    /// - `model`        ← `self.cfg.model`
    /// - `messages`     ← argument (roles `system` / `user` / `assistant`)
    /// - `num_predict`  ← `self.cfg.max_tokens`
    /// - `temperature`  ← `self.cfg.temperature`
    /// - `top_p`        ← `self.cfg.top_p`
    #[instrument(skip_all, fields(model = %self.cfg.model, messages = messages.len()))]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        let body = ChatRequest {
            model: &self.cfg.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: false,
            options: GenerateOptions {
                temperature: self.cfg.temperature,
                top_p: self.cfg.top_p,
                num_predict: self.cfg.max_tokens,
            },
        };

        debug!("POST {}", self.url_chat);
        let resp = self.client.post(&self.url_chat).json(&body).send().await?;

        if !resp.status().is_success() {
            return Err(status_error(LlmProvider::Ollama, &self.url_chat, resp).await);
        }

        let out: ChatResponse = resp.json().await.map_err(|e| {
            ProviderError::decode(
                LlmProvider::Ollama,
                format!("serde error: {e}; ensure `stream=false` is used"),
            )
        })?;

        out.message
            .map(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::new(LlmProvider::Ollama, ProviderErrorKind::EmptyChoices).into())
    }

    /// Embeds a single input via `/api/embed`.
    pub async fn embed_one(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let mut out = self.embed_many(&[input.to_string()]).await?;
        out.pop().ok_or_else(|| {
            ProviderError::decode(LlmProvider::Ollama, "empty `embeddings` in response").into()
        })
    }

    /// Embeds many inputs in one `/api/embed` call, preserving order.
    #[instrument(skip_all, fields(model = %self.cfg.model, batch = inputs.len()))]
    pub async fn embed_many(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbedRequest {
            model: &self.cfg.model,
            input: inputs,
        };

        debug!("POST {}", self.url_embed);
        let resp = self.client.post(&self.url_embed).json(&body).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!("model or endpoint not found; is the embedding model pulled?");
        }
        if !resp.status().is_success() {
            return Err(status_error(LlmProvider::Ollama, &self.url_embed, resp).await);
        }

        let out: EmbedResponse = resp.json().await.map_err(|e| {
            ProviderError::decode(
                LlmProvider::Ollama,
                format!("serde error: {e}; expected `{{ embeddings: number[][] }}`"),
            )
        })?;

        if out.embeddings.len() != inputs.len() {
            return Err(ProviderError::new(
                LlmProvider::Ollama,
                ProviderErrorKind::CountMismatch {
                    expected: inputs.len(),
                    got: out.embeddings.len(),
                },
            )
            .into());
        }
        Ok(out.embeddings)
    }
}

/* ==========================
HTTP payloads & options
========================== */

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Request body for `/api/chat` (non-streaming).
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    options: GenerateOptions,
}

/// Subset of Ollama `options`.
#[derive(Debug, Default, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<OutMessage>,
}

#[derive(Debug, Deserialize)]
struct OutMessage {
    content: String,
}

/// Request body for `/api/embed`.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response body for `/api/embed`.
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}
