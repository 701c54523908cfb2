//! Default LLM configs loaded from environment variables.
//!
//! Two roles are built from the same provider selection:
//!
//! - **Chat**      → answers user turns (persona + history + context)
//! - **Embedding** → turns queries into vectors for retrieval
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_PROVIDER`     = `gemini` (default) | `ollama` | `openai`
//! - `CHAT_MODEL`       = chat model (provider default if unset)
//! - `EMBEDDING_MODEL`  = embedding model (provider default if unset)
//! - `LLM_MAX_TOKENS`   = optional max tokens (u32)
//! - `LLM_TEMPERATURE`  = optional temperature (0.0..=2.0, default 0.7)
//! - `LLM_TIMEOUT_SECS` = optional request timeout (default 60)
//!
//! Provider-specific:
//! - Gemini: `GEMINI_API_KEY` (required), `GEMINI_URL`
//! - Ollama: `OLLAMA_URL` or `OLLAMA_PORT` (required)
//! - OpenAI: `OPENAI_API_KEY` (required), `OPENAI_URL`

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ConfigError, EnvLookup, must_var, opt_var, process_env, validate_http_endpoint,
        validate_range_f32, var_opt_f32, var_opt_u32, var_opt_u64,
    },
};

const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";

/// Chat profile from the process environment.
pub fn config_chat() -> Result<LlmModelConfig, AiLlmError> {
    chat_config_from(&process_env)
}

/// Embedding profile from the process environment.
pub fn config_embedding() -> Result<LlmModelConfig, AiLlmError> {
    embedding_config_from(&process_env)
}

/// Builds the **chat** profile.
///
/// # Defaults
/// - `temperature = Some(0.7)`
/// - `timeout_secs = Some(60)`
pub fn chat_config_from(lookup: EnvLookup<'_>) -> Result<LlmModelConfig, AiLlmError> {
    let provider = provider_from(lookup)?;
    let (endpoint, api_key) = connection(lookup, provider)?;
    let model = opt_var(lookup, "CHAT_MODEL").unwrap_or_else(|| default_chat_model(provider).into());

    let temperature = var_opt_f32(lookup, "LLM_TEMPERATURE")?.unwrap_or(0.7);
    validate_range_f32("temperature", temperature, 0.0, 2.0)?;

    Ok(LlmModelConfig {
        provider,
        model,
        endpoint,
        api_key,
        max_tokens: var_opt_u32(lookup, "LLM_MAX_TOKENS")?,
        temperature: Some(temperature),
        top_p: None,
        timeout_secs: Some(var_opt_u64(lookup, "LLM_TIMEOUT_SECS")?.unwrap_or(60)),
    })
}

/// Builds the **embedding** profile.
///
/// # Defaults
/// - `temperature = Some(0.0)` (ignored by embedding endpoints)
/// - `timeout_secs = Some(30)`
pub fn embedding_config_from(lookup: EnvLookup<'_>) -> Result<LlmModelConfig, AiLlmError> {
    let provider = provider_from(lookup)?;
    let (endpoint, api_key) = connection(lookup, provider)?;
    let model = opt_var(lookup, "EMBEDDING_MODEL")
        .unwrap_or_else(|| default_embedding_model(provider).into());

    Ok(LlmModelConfig {
        provider,
        model,
        endpoint,
        api_key,
        max_tokens: None,
        temperature: Some(0.0),
        top_p: None,
        timeout_secs: Some(30),
    })
}

fn provider_from(lookup: EnvLookup<'_>) -> Result<LlmProvider, AiLlmError> {
    match opt_var(lookup, "LLM_PROVIDER") {
        Some(p) => Ok(p.parse::<LlmProvider>()?),
        None => Ok(LlmProvider::Gemini),
    }
}

/// Resolves `(endpoint, api_key)` for the selected provider.
fn connection(
    lookup: EnvLookup<'_>,
    provider: LlmProvider,
) -> Result<(String, Option<String>), AiLlmError> {
    match provider {
        LlmProvider::Gemini => {
            let url = opt_var(lookup, "GEMINI_URL").unwrap_or_else(|| GEMINI_DEFAULT_URL.into());
            validate_http_endpoint("GEMINI_URL", &url)?;
            Ok((url, Some(must_var(lookup, "GEMINI_API_KEY")?)))
        }
        LlmProvider::OpenAI => {
            let url = opt_var(lookup, "OPENAI_URL").unwrap_or_else(|| OPENAI_DEFAULT_URL.into());
            validate_http_endpoint("OPENAI_URL", &url)?;
            Ok((url, Some(must_var(lookup, "OPENAI_API_KEY")?)))
        }
        LlmProvider::Ollama => Ok((ollama_endpoint(lookup)?, None)),
    }
}

/// Resolves the Ollama endpoint.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
fn ollama_endpoint(lookup: EnvLookup<'_>) -> Result<String, AiLlmError> {
    if let Some(url) = opt_var(lookup, "OLLAMA_URL") {
        validate_http_endpoint("OLLAMA_URL", &url)?;
        return Ok(url);
    }
    if let Some(port) = opt_var(lookup, "OLLAMA_PORT") {
        port.parse::<u16>().map_err(|_| ConfigError::InvalidNumber {
            var: "OLLAMA_PORT",
            reason: "expected u16 (1..=65535)",
        })?;
        return Ok(format!("http://localhost:{port}"));
    }
    Err(ConfigError::MissingVar("OLLAMA_URL or OLLAMA_PORT").into())
}

fn default_chat_model(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::Gemini => "gemini-1.5-flash",
        LlmProvider::Ollama => "llama3.1:8b",
        LlmProvider::OpenAI => "gpt-4o-mini",
    }
}

fn default_embedding_model(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::Gemini => "text-embedding-004",
        LlmProvider::Ollama => "nomic-embed-text",
        LlmProvider::OpenAI => "text-embedding-3-small",
    }
}
