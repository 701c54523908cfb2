use std::{fmt, str::FromStr};

use crate::error_handler::ConfigError;

/// Represents the provider (backend) used for chat completions and embeddings.
///
/// # Examples
///
/// ```
/// use ai_llm_service::LlmProvider;
///
/// let p: LlmProvider = "gemini".parse().unwrap();
/// assert_eq!(p, LlmProvider::Gemini);
/// ```
///
/// Adding more providers is done by extending this enum and wiring a client
/// in [`crate::services`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProvider {
    /// Google Generative Language API (Gemini models).
    Gemini,
    /// Local or remote Ollama runtime.
    Ollama,
    /// OpenAI REST API (or any compatible gateway).
    OpenAI,
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            "ollama" => Ok(LlmProvider::Ollama),
            "openai" | "chatgpt" => Ok(LlmProvider::OpenAI),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::Ollama => "ollama",
            LlmProvider::OpenAI => "openai",
        };
        f.write_str(name)
    }
}
