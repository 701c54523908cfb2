//! Gemini (Google Generative Language API) client for chat and embeddings.
//!
//! Endpoints are derived from `LlmModelConfig::endpoint`:
//! - `POST {endpoint}/v1beta/models/{model}:generateContent`     : chat (non-streaming)
//! - `POST {endpoint}/v1beta/models/{model}:embedContent`        : single embedding
//! - `POST {endpoint}/v1beta/models/{model}:batchEmbedContents`  : batched embeddings
//!
//! The API key travels in the `x-goog-api-key` header so it never appears in
//! URLs or logs.

use std::time::Instant;

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::{
    chat_message::{ChatMessage, ChatRole},
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ProviderError, ProviderErrorKind, check_endpoint, status_error,
    },
};

/// Thin client for the Gemini REST API.
#[derive(Debug)]
pub struct GeminiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_generate: String,
    url_embed: String,
    url_batch_embed: String,
}

impl GeminiService {
    /// Creates a new [`GeminiService`] from the given config.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not Gemini
    /// - `MissingApiKey` if `cfg.api_key` is `None`
    /// - `InvalidEndpoint` if `cfg.endpoint` is not http(s)
    /// - [`AiLlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::Gemini {
            return Err(
                ProviderError::new(LlmProvider::Gemini, ProviderErrorKind::InvalidProvider).into(),
            );
        }
        let api_key = cfg.api_key.clone().ok_or_else(|| {
            ProviderError::new(LlmProvider::Gemini, ProviderErrorKind::MissingApiKey)
        })?;
        check_endpoint(LlmProvider::Gemini, &cfg.endpoint)?;

        let mut headers = header::HeaderMap::new();
        let mut key = header::HeaderValue::from_str(&api_key).map_err(|e| {
            ProviderError::decode(LlmProvider::Gemini, format!("invalid API key header: {e}"))
        })?;
        key.set_sensitive(true);
        headers.insert("x-goog-api-key", key);

        let client = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .default_headers(headers)
            .gzip(true)
            .build()?;

        let model = cfg.model.trim().trim_start_matches("models/");
        let base = format!("{}/v1beta/models/{}", cfg.base_url(), model);

        info!(
            provider = %cfg.provider,
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = cfg.timeout().as_secs(),
            "GeminiService initialized"
        );

        Ok(Self {
            client,
            url_generate: format!("{base}:generateContent"),
            url_embed: format!("{base}:embedContent"),
            url_batch_embed: format!("{base}:batchEmbedContents"),
            cfg,
        })
    }

    /// Fully-qualified model resource name (`models/{id}`).
    fn model_resource(&self) -> String {
        format!("models/{}", self.cfg.model.trim().trim_start_matches("models/"))
    }

    /// Performs a **non-streaming** `generateContent` call.
    ///
    /// System messages are merged into `systemInstruction`; assistant
    /// messages are sent with Gemini's `model` role.
    ///
    /// # Errors
    /// - `HttpStatus` for non-2xx responses
    /// - [`AiLlmError::HttpTransport`] for client/network failures
    /// - `Decode` / `EmptyChoices` if no text can be extracted
    #[instrument(skip_all, fields(model = %self.cfg.model, messages = messages.len()))]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        let started = Instant::now();
        let body = GenerateContentRequest::from_messages(&self.cfg, messages);

        debug!("POST {}", self.url_generate);
        let resp = self
            .client
            .post(&self.url_generate)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let err = status_error(LlmProvider::Gemini, &self.url_generate, resp).await;
            error!(
                error = %err,
                latency_ms = started.elapsed().as_millis(),
                "Gemini generateContent returned non-success status"
            );
            return Err(err);
        }

        let out: GenerateContentResponse = resp.json().await.map_err(|e| {
            ProviderError::decode(
                LlmProvider::Gemini,
                format!("serde error: {e}; expected `candidates[0].content.parts[].text`"),
            )
        })?;

        let text = out
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .find(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::new(LlmProvider::Gemini, ProviderErrorKind::EmptyChoices))?;

        info!(
            latency_ms = started.elapsed().as_millis(),
            reply_len = text.len(),
            "generateContent completed"
        );
        Ok(text)
    }

    /// Embeds a single text via `embedContent`.
    #[instrument(skip_all, fields(model = %self.cfg.model, input_len = input.len()))]
    pub async fn embed_one(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let body = EmbedContentRequest {
            model: self.model_resource(),
            content: Content::text(None, input),
        };

        debug!("POST {}", self.url_embed);
        let resp = self.client.post(&self.url_embed).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(status_error(LlmProvider::Gemini, &self.url_embed, resp).await);
        }

        let out: EmbedContentResponse = resp.json().await.map_err(|e| {
            ProviderError::decode(
                LlmProvider::Gemini,
                format!("serde error: {e}; expected `embedding.values`"),
            )
        })?;
        Ok(out.embedding.values)
    }

    /// Embeds many texts in one `batchEmbedContents` call, preserving order.
    #[instrument(skip_all, fields(model = %self.cfg.model, batch = inputs.len()))]
    pub async fn embed_many(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AiLlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.model_resource();
        let body = BatchEmbedRequest {
            requests: inputs
                .iter()
                .map(|t| EmbedContentRequest {
                    model: model.clone(),
                    content: Content::text(None, t),
                })
                .collect(),
        };

        debug!("POST {}", self.url_batch_embed);
        let resp = self
            .client
            .post(&self.url_batch_embed)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(status_error(LlmProvider::Gemini, &self.url_batch_embed, resp).await);
        }

        let out: BatchEmbedResponse = resp.json().await.map_err(|e| {
            ProviderError::decode(
                LlmProvider::Gemini,
                format!("serde error: {e}; expected `embeddings[].values`"),
            )
        })?;
        if out.embeddings.len() != inputs.len() {
            return Err(ProviderError::new(
                LlmProvider::Gemini,
                ProviderErrorKind::CountMismatch {
                    expected: inputs.len(),
                    got: out.embeddings.len(),
                },
            )
            .into());
        }
        Ok(out.embeddings.into_iter().map(|e| e.values).collect())
    }
}

/* ===========================================================================
HTTP payloads
======================================================================== */

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn text(role: Option<&'static str>, text: &'a str) -> Self {
        Self {
            role,
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_messages(cfg: &LlmModelConfig, messages: &'a [ChatMessage]) -> Self {
        let system_parts: Vec<Part<'a>> = messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| Part { text: &m.content })
            .collect();

        let contents = messages
            .iter()
            .filter_map(|m| match m.role {
                ChatRole::System => None,
                ChatRole::User => Some(Content::text(Some("user"), &m.content)),
                ChatRole::Assistant => Some(Content::text(Some("model"), &m.content)),
            })
            .collect();

        Self {
            system_instruction: (!system_parts.is_empty()).then_some(SystemInstruction {
                parts: system_parts,
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: cfg.temperature,
                top_p: cfg.top_p,
                max_output_tokens: cfg.max_tokens,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handler::FailureCategory;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cfg(endpoint: &str, model: &str) -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::Gemini,
            model: model.into(),
            endpoint: endpoint.into(),
            api_key: Some("test-key".into()),
            max_tokens: Some(128),
            temperature: Some(0.7),
            top_p: None,
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn rejects_config_without_key() {
        let mut c = cfg("http://localhost", "gemini-1.5-flash");
        c.api_key = None;
        let err = GeminiService::new(c).unwrap_err();
        assert_eq!(err.category(), FailureCategory::Config);
    }

    #[tokio::test]
    async fn chat_sends_system_instruction_and_model_role() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "systemInstruction": { "parts": [{ "text": "be kind" }] },
                "contents": [
                    { "role": "user", "parts": [{ "text": "hi" }] },
                    { "role": "model", "parts": [{ "text": "hello" }] },
                    { "role": "user", "parts": [{ "text": "how?" }] }
                ],
                "generationConfig": { "maxOutputTokens": 128 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Like " }, { "text": "this." }] }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let svc = GeminiService::new(cfg(&server.uri(), "models/gemini-1.5-flash")).unwrap();
        let reply = svc
            .chat(&[
                ChatMessage::system("be kind"),
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
                ChatMessage::user("how?"),
            ])
            .await
            .unwrap();
        assert_eq!(reply, "Like this.");
    }

    #[tokio::test]
    async fn quota_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
            .mount(&server)
            .await;

        let svc = GeminiService::new(cfg(&server.uri(), "gemini-1.5-flash")).unwrap();
        let err = svc.chat(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert_eq!(err.category(), FailureCategory::RateLimit);
        assert!(err.to_string().contains("RESOURCE_EXHAUSTED"));
    }

    #[tokio::test]
    async fn empty_candidates_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let svc = GeminiService::new(cfg(&server.uri(), "gemini-1.5-flash")).unwrap();
        let err = svc.chat(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert_eq!(err.category(), FailureCategory::Decode);
    }

    #[tokio::test]
    async fn embeddings_single_and_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-embedding-004:embedContent"))
            .and(body_partial_json(json!({ "model": "models/text-embedding-004" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "embedding": { "values": [0.1, 0.2] } })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-embedding-004:batchEmbedContents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [ { "values": [1.0] }, { "values": [2.0] } ]
            })))
            .mount(&server)
            .await;

        let svc = GeminiService::new(cfg(&server.uri(), "text-embedding-004")).unwrap();
        assert_eq!(svc.embed_one("q").await.unwrap(), vec![0.1, 0.2]);
        let many = svc
            .embed_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(many, vec![vec![1.0], vec![2.0]]);
    }

    #[tokio::test]
    async fn batch_count_mismatch_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-embedding-004:batchEmbedContents"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "embeddings": [ { "values": [1.0] } ] })),
            )
            .mount(&server)
            .await;

        let svc = GeminiService::new(cfg(&server.uri(), "text-embedding-004")).unwrap();
        let err = svc
            .embed_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AiLlmError::Provider(ProviderError {
                kind: ProviderErrorKind::CountMismatch { expected: 2, got: 1 },
                ..
            })
        ));
    }
}
