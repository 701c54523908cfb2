//! OpenAI (ChatGPT) service for text generation and embeddings.
//!
//! Minimal, non-streaming client around OpenAI REST API.
//! Endpoints are derived from `LlmModelConfig::endpoint`:
//! - POST {endpoint}/v1/chat/completions : chat completion
//! - POST {endpoint}/v1/embeddings       : embeddings (single or batched)
//!
//! Constructor validation:
//! - `cfg.provider` must be `LlmProvider::OpenAI`
//! - `cfg.api_key` must be present
//! - `cfg.endpoint` must start with http:// or https://

use std::time::Instant;

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    chat_message::ChatMessage,
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ProviderError, ProviderErrorKind, check_endpoint, status_error,
    },
};

/// Thin client for the OpenAI API (ChatGPT).
///
/// Internally keeps a preconfigured `reqwest::Client` (with timeout and the
/// bearer `Authorization` header).
#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    url_embeddings: String,
}

impl OpenAiService {
    /// Creates a new [`OpenAiService`] from the given config.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not OpenAI
    /// - `MissingApiKey` if `cfg.api_key` is `None`
    /// - `InvalidEndpoint` if `cfg.endpoint` is invalid
    /// - [`AiLlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::OpenAI {
            return Err(
                ProviderError::new(LlmProvider::OpenAI, ProviderErrorKind::InvalidProvider).into(),
            );
        }
        let api_key = cfg.api_key.as_deref().ok_or_else(|| {
            ProviderError::new(LlmProvider::OpenAI, ProviderErrorKind::MissingApiKey)
        })?;
        check_endpoint(LlmProvider::OpenAI, &cfg.endpoint)?;

        let mut auth = header::HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
            ProviderError::decode(LlmProvider::OpenAI, format!("invalid API key header: {e}"))
        })?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .default_headers(headers)
            .build()?;

        let base = cfg.base_url().to_string();
        info!(
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = cfg.timeout().as_secs(),
            "OpenAiService initialized"
        );

        Ok(Self {
            client,
            url_chat: format!("{base}/v1/chat/completions"),
            url_embeddings: format!("{base}/v1/embeddings"),
            cfg,
        })
    }

    /// Performs a **non-streaming** chat completion over the full message list.
    ///
    /// Mapped options from config: `model`, `temperature`, `top_p`, `max_tokens`.
    ///
    /// # Errors
    /// - `HttpStatus` for non-2xx responses
    /// - [`AiLlmError::HttpTransport`] for client/network failures
    /// - `Decode` if the JSON cannot be parsed
    /// - `EmptyChoices` if no choice carries text
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        let started = Instant::now();
        let body = ChatCompletionRequest {
            model: &self.cfg.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: self.cfg.temperature,
            top_p: self.cfg.top_p,
            max_tokens: self.cfg.max_tokens,
        };

        debug!(model = %self.cfg.model, messages = messages.len(), "POST {}", self.url_chat);

        let resp = self.client.post(&self.url_chat).json(&body).send().await?;
        if !resp.status().is_success() {
            let err = status_error(LlmProvider::OpenAI, &self.url_chat, resp).await;
            error!(
                error = %err,
                model = %self.cfg.model,
                latency_ms = started.elapsed().as_millis(),
                "OpenAI /v1/chat/completions returned non-success status"
            );
            return Err(err);
        }

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            ProviderError::decode(
                LlmProvider::OpenAI,
                format!("serde error: {e}; expected `choices[0].message.content`"),
            )
        })?;

        let content = out
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .find(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::new(LlmProvider::OpenAI, ProviderErrorKind::EmptyChoices))?;

        info!(
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            "chat completion completed"
        );
        Ok(content)
    }

    /// Retrieves a single embeddings vector.
    pub async fn embed_one(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let mut out = self.embed_many(&[input.to_string()]).await?;
        out.pop().ok_or_else(|| {
            ProviderError::decode(LlmProvider::OpenAI, "empty `data` in embeddings response").into()
        })
    }

    /// Retrieves embeddings for many inputs in one request.
    ///
    /// Items are re-ordered by their `index` field so the output lines up
    /// with `inputs`.
    pub async fn embed_many(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            input: inputs,
        };

        debug!(model = %self.cfg.model, batch = inputs.len(), "POST {}", self.url_embeddings);

        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let err = status_error(LlmProvider::OpenAI, &self.url_embeddings, resp).await;
            error!(
                error = %err,
                model = %self.cfg.model,
                latency_ms = started.elapsed().as_millis(),
                "OpenAI /v1/embeddings returned non-success status"
            );
            return Err(err);
        }

        let mut out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            ProviderError::decode(
                LlmProvider::OpenAI,
                format!("serde error: {e}; expected `data[].embedding`"),
            )
        })?;

        if out.data.len() != inputs.len() {
            return Err(ProviderError::new(
                LlmProvider::OpenAI,
                ProviderErrorKind::CountMismatch {
                    expected: inputs.len(),
                    got: out.data.len(),
                },
            )
            .into());
        }
        out.data.sort_by_key(|item| item.index);

        debug!(
            batch = inputs.len(),
            latency_ms = started.elapsed().as_millis(),
            "embeddings completed"
        );
        Ok(out.data.into_iter().map(|item| item.embedding).collect())
    }
}

/* ===========================================================================
HTTP payloads & options
======================================================================== */

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cfg(endpoint: &str) -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::OpenAI,
            model: "gpt-4o-mini".into(),
            endpoint: endpoint.to_string(),
            api_key: Some("sk-test".into()),
            max_tokens: Some(64),
            temperature: Some(0.7),
            top_p: None,
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn requires_api_key() {
        let mut c = cfg("https://api.openai.com");
        c.api_key = None;
        let err = OpenAiService::new(c).unwrap_err();
        assert!(matches!(
            err,
            AiLlmError::Provider(ProviderError {
                kind: ProviderErrorKind::MissingApiKey,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn chat_sends_bearer_and_roles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 64,
                "messages": [
                    { "role": "system", "content": "persona" },
                    { "role": "user", "content": "q1" },
                    { "role": "assistant", "content": "a1" },
                    { "role": "user", "content": "q2" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "a2" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let svc = OpenAiService::new(cfg(&server.uri())).unwrap();
        let out = svc
            .chat(&[
                ChatMessage::system("persona"),
                ChatMessage::user("q1"),
                ChatMessage::assistant("a1"),
                ChatMessage::user("q2"),
            ])
            .await
            .unwrap();
        assert_eq!(out, "a2");
    }

    #[tokio::test]
    async fn embeddings_are_reordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "index": 1, "embedding": [0.0, 2.0] },
                    { "index": 0, "embedding": [1.0, 0.0] }
                ]
            })))
            .mount(&server)
            .await;

        let svc = OpenAiService::new(cfg(&server.uri())).unwrap();
        let out = svc
            .embed_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(out, vec![vec![1.0, 0.0], vec![0.0, 2.0]]);
    }

    #[tokio::test]
    async fn unauthorized_is_classified_as_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let svc = OpenAiService::new(cfg(&server.uri())).unwrap();
        let err = svc.embed_one("x").await.unwrap_err();
        assert_eq!(err.category(), crate::FailureCategory::Auth);
    }
}
