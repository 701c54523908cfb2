//! Unified error handling for `ai-llm-service`.
//!
//! This module exposes a single top-level error type [`AiLlmError`] for the whole
//! library, and groups domain-specific errors in nested enums ([`ConfigError`],
//! [`ProviderError`]). Small helpers for reading/validating environment variables
//! are provided and return the unified [`Result<T>`] alias.
//!
//! All messages include the suffix `[AI LLM Service]` to simplify attribution in logs.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::config::llm_provider::LlmProvider;

/* ------------------------------------------------------------------------- */
/* Public result alias                                                       */
/* ------------------------------------------------------------------------- */

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, AiLlmError>;

/* ------------------------------------------------------------------------- */
/* Top-level error                                                           */
/* ------------------------------------------------------------------------- */

/// Top-level error for the `ai-llm-service` crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AiLlmError {
    /// Configuration/validation errors (startup).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Provider-specific failures (bad status, undecodable payload, ...).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Underlying HTTP transport error (e.g., `reqwest::Error`).
    #[error("[AI LLM Service] transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Operation exceeded the configured timeout.
    #[error("[AI LLM Service] operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Coarse classification of a failure, used for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Invalid or missing credentials (401/403).
    Auth,
    /// Quota or rate limit reached (429).
    RateLimit,
    /// Connectivity problems or timeouts.
    Network,
    /// Provider answered with another non-success status.
    Upstream,
    /// Provider answered, but the payload was not usable.
    Decode,
    /// Local misconfiguration.
    Config,
}

impl AiLlmError {
    /// Classifies this error (auth / quota / network / ...).
    pub fn category(&self) -> FailureCategory {
        match self {
            AiLlmError::Config(_) => FailureCategory::Config,
            AiLlmError::Timeout(_) => FailureCategory::Network,
            AiLlmError::HttpTransport(e) => {
                if e.is_decode() {
                    FailureCategory::Decode
                } else {
                    FailureCategory::Network
                }
            }
            AiLlmError::Provider(p) => match &p.kind {
                ProviderErrorKind::HttpStatus(http) => match http.status {
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureCategory::Auth,
                    StatusCode::TOO_MANY_REQUESTS => FailureCategory::RateLimit,
                    _ => FailureCategory::Upstream,
                },
                ProviderErrorKind::InvalidProvider
                | ProviderErrorKind::MissingApiKey
                | ProviderErrorKind::InvalidEndpoint(_) => FailureCategory::Config,
                ProviderErrorKind::Decode(_)
                | ProviderErrorKind::EmptyChoices
                | ProviderErrorKind::CountMismatch { .. } => FailureCategory::Decode,
            },
        }
    }
}

/* ------------------------------------------------------------------------- */
/* Config errors                                                             */
/* ------------------------------------------------------------------------- */

/// Error enum for environment/config-driven setup.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("[AI LLM Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (like ports, limits, timeouts).
    #[error("[AI LLM Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `LLM_MAX_TOKENS`, `OLLAMA_PORT`).
        var: &'static str,
        /// Human-readable reason (e.g., `expected u32`).
        reason: &'static str,
    },

    /// Unsupported provider in `LLM_PROVIDER`.
    #[error("[AI LLM Service] unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Value had the wrong format (e.g., invalid URL).
    #[error("[AI LLM Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        /// Variable name (e.g., `OLLAMA_URL`).
        var: &'static str,
        /// Explanation (e.g., `must start with http:// or https://`).
        reason: &'static str,
    },

    /// A numeric field was outside of the allowed range.
    #[error("[AI LLM Service] {field} is out of range: {detail}")]
    OutOfRange {
        /// Field name (e.g., `temperature`).
        field: &'static str,
        /// Description of the expected range.
        detail: &'static str,
    },

    /// Model name was empty.
    #[error("[AI LLM Service] model name must not be empty")]
    EmptyModel,
}

/* ------------------------------------------------------------------------- */
/* Provider errors                                                           */
/* ------------------------------------------------------------------------- */

/// Non-success HTTP answer from a provider.
#[derive(Debug)]
pub struct HttpError {
    /// HTTP status code.
    pub status: StatusCode,
    /// Request URL (never contains credentials).
    pub url: String,
    /// Short, trimmed snippet of the response body.
    pub snippet: String,
}

/// What went wrong while talking to a provider.
#[non_exhaustive]
#[derive(Debug)]
pub enum ProviderErrorKind {
    /// A client was constructed with a config for another provider.
    InvalidProvider,
    /// The provider requires an API key and none was configured.
    MissingApiKey,
    /// The endpoint is empty or does not start with http/https.
    InvalidEndpoint(String),
    /// Upstream returned a non-successful HTTP status.
    HttpStatus(HttpError),
    /// Response payload could not be decoded as expected.
    Decode(String),
    /// Chat response carried no usable candidate/choice.
    EmptyChoices,
    /// Batched embeddings returned a different number of vectors than inputs.
    CountMismatch { expected: usize, got: usize },
}

/// Provider-attributed error.
#[derive(Debug, Error)]
#[error("[AI LLM Service] {provider} error: {}", describe(.kind))]
pub struct ProviderError {
    pub provider: LlmProvider,
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: LlmProvider, kind: ProviderErrorKind) -> Self {
        Self { provider, kind }
    }

    /// Shorthand for [`ProviderErrorKind::Decode`].
    pub fn decode(provider: LlmProvider, msg: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Decode(msg.into()))
    }
}

fn describe(kind: &ProviderErrorKind) -> String {
    match kind {
        ProviderErrorKind::InvalidProvider => "config targets a different provider".into(),
        ProviderErrorKind::MissingApiKey => "missing API key".into(),
        ProviderErrorKind::InvalidEndpoint(e) => format!("invalid endpoint: {e}"),
        ProviderErrorKind::HttpStatus(h) => {
            format!("HTTP {} from {}: {}", h.status, h.url, h.snippet)
        }
        ProviderErrorKind::Decode(m) => format!("decode error: {m}"),
        ProviderErrorKind::EmptyChoices => "response contained no candidates".into(),
        ProviderErrorKind::CountMismatch { expected, got } => {
            format!("expected {expected} embeddings, got {got}")
        }
    }
}

/// Trims a response body to a log-friendly single-line snippet (max 240 chars).
pub fn make_snippet(body: &str) -> String {
    body.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(240)
        .collect()
}

/// Reads a non-success response into a [`ProviderError`] with a body snippet.
pub(crate) async fn status_error(
    provider: LlmProvider,
    url: &str,
    resp: reqwest::Response,
) -> AiLlmError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    ProviderError::new(
        provider,
        ProviderErrorKind::HttpStatus(HttpError {
            status,
            url: url.to_string(),
            snippet: make_snippet(&text),
        }),
    )
    .into()
}

/// Validates endpoint/provider invariants shared by all clients.
pub(crate) fn check_endpoint(provider: LlmProvider, endpoint: &str) -> Result<()> {
    let e = endpoint.trim();
    if e.is_empty() || !(e.starts_with("http://") || e.starts_with("https://")) {
        return Err(ProviderError::new(
            provider,
            ProviderErrorKind::InvalidEndpoint(endpoint.to_string()),
        )
        .into());
    }
    Ok(())
}

/* ------------------------------------------------------------------------- */
/* Env helpers (return unified `Result<T>`)                                  */
/* ------------------------------------------------------------------------- */

/// Variable lookup used by the config loaders (process env in production,
/// a map in tests).
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Reads from the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Returns the trimmed value if set and non-empty.
pub fn opt_var(lookup: EnvLookup<'_>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Fetches a required, non-empty variable.
///
/// # Errors
/// Returns [`ConfigError::MissingVar`] if the variable is absent or empty.
pub fn must_var(lookup: EnvLookup<'_>, name: &'static str) -> Result<String> {
    opt_var(lookup, name).ok_or_else(|| ConfigError::MissingVar(name).into())
}

/// Fetches a required, non-empty environment variable.
pub fn must_env(name: &'static str) -> Result<String> {
    must_var(&process_env, name)
}

/// Parses an optional `u32` (`Ok(None)` if unset/empty).
pub fn var_opt_u32(lookup: EnvLookup<'_>, name: &'static str) -> Result<Option<u32>> {
    parse_opt(lookup, name, "expected u32")
}

/// Parses an optional `u64` (`Ok(None)` if unset/empty).
pub fn var_opt_u64(lookup: EnvLookup<'_>, name: &'static str) -> Result<Option<u64>> {
    parse_opt(lookup, name, "expected u64")
}

/// Parses an optional `f32` (`Ok(None)` if unset/empty).
pub fn var_opt_f32(lookup: EnvLookup<'_>, name: &'static str) -> Result<Option<f32>> {
    parse_opt(lookup, name, "expected float")
}

fn parse_opt<T: std::str::FromStr>(
    lookup: EnvLookup<'_>,
    name: &'static str,
    reason: &'static str,
) -> Result<Option<T>> {
    match opt_var(lookup, name) {
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var: name, reason }.into()),
        None => Ok(None),
    }
}

/* ------------------------------------------------------------------------- */
/* Validation helpers (return unified `Result<T>`)                           */
/* ------------------------------------------------------------------------- */

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
///
/// # Errors
/// Returns [`ConfigError::InvalidFormat`] when the string does not start with
/// a valid HTTP scheme.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        }
        .into())
    }
}

/// Validates that a floating-point value lies within an inclusive range.
///
/// # Errors
/// Returns [`ConfigError::OutOfRange`] if `value` is outside `[min, max]`.
pub fn validate_range_f32(field: &'static str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            detail: "expected value in inclusive range",
        }
        .into())
    }
}
