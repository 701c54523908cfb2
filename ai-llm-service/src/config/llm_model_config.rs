use crate::config::llm_provider::LlmProvider;

/// Configuration for an LLM model invocation (chat or embeddings).
///
/// # Fields
///
/// - `provider`: Which backend to use (Gemini, Ollama, OpenAI).
/// - `model`: The model identifier (e.g., `"gemini-1.5-flash"`, `"text-embedding-004"`).
/// - `endpoint`: Base URL of the provider API (no trailing path).
/// - `api_key`: Optional API key for providers that require authentication.
/// - `max_tokens`: Maximum number of tokens to generate (if supported).
/// - `temperature`: Controls randomness (0.0 = deterministic).
/// - `top_p`: Nucleus sampling cutoff.
/// - `timeout_secs`: Optional request timeout in seconds.
///
/// # Examples
///
/// ```
/// use ai_llm_service::{LlmModelConfig, LlmProvider};
///
/// let cfg = LlmModelConfig {
///     provider: LlmProvider::Gemini,
///     model: "gemini-1.5-flash".to_string(),
///     endpoint: "https://generativelanguage.googleapis.com".to_string(),
///     api_key: Some("AIza...".to_string()),
///     max_tokens: Some(1024),
///     temperature: Some(0.7),
///     top_p: None,
///     timeout_secs: Some(60),
/// };
/// assert_eq!(cfg.timeout().as_secs(), 60);
/// ```
#[derive(Debug, Clone)]
pub struct LlmModelConfig {
    /// The LLM provider/backend.
    pub provider: LlmProvider,

    /// Model identifier string.
    pub model: String,

    /// Provider base URL.
    pub endpoint: String,

    /// Optional API key for authentication.
    pub api_key: Option<String>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}

/// Fallback request timeout when the config does not set one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

impl LlmModelConfig {
    /// Effective request timeout.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Endpoint without surrounding whitespace and trailing slashes.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim().trim_end_matches('/')
    }
}
