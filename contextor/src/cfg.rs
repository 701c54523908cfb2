//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use ai_llm_service::error_handler::{EnvLookup, opt_var, process_env};

use crate::conversation::MIN_MESSAGES_PER_THREAD;
use crate::error::ContextorError;

pub const DEFAULT_THREAD_ID: &str = "default";
pub const DEFAULT_HISTORY_WINDOW: usize = 20;
pub const DEFAULT_HISTORY_MAX_MESSAGES: usize = 200;
pub const DEFAULT_HISTORY_MAX_THREADS: usize = 1_000;
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;

/// Config bag for the chat pipeline. All fields have defaults.
#[derive(Clone, Debug)]
pub struct ContextorConfig {
    /// Persona file; the built-in persona is used when unset.
    pub persona_path: Option<PathBuf>,
    /// Thread used when the caller sends none.
    pub default_thread_id: String,
    /// Most recent messages sent to the model with each turn.
    pub history_window: usize,
    /// Messages retained per thread before the oldest are evicted.
    pub history_max_messages: usize,
    /// Threads kept in memory; the least recently used idle one is evicted beyond this.
    pub history_max_threads: usize,
    /// Upper bound on one model call.
    pub generation_timeout: Duration,
}

impl Default for ContextorConfig {
    fn default() -> Self {
        Self {
            persona_path: None,
            default_thread_id: DEFAULT_THREAD_ID.into(),
            history_window: DEFAULT_HISTORY_WINDOW,
            history_max_messages: DEFAULT_HISTORY_MAX_MESSAGES,
            history_max_threads: DEFAULT_HISTORY_MAX_THREADS,
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
        }
    }
}

impl ContextorConfig {
    /// Build from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self, ContextorError> {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self, ContextorError> {
        let mut cfg = Self::default();
        cfg.persona_path = opt_var(lookup, "PERSONA_PROMPT_PATH").map(PathBuf::from);
        if let Some(t) = opt_var(lookup, "DEFAULT_THREAD_ID") {
            cfg.default_thread_id = t;
        }
        if let Some(v) = opt_var(lookup, "HISTORY_WINDOW") {
            cfg.history_window = parse("HISTORY_WINDOW", &v)?;
        }
        if let Some(v) = opt_var(lookup, "HISTORY_MAX_MESSAGES") {
            cfg.history_max_messages = parse("HISTORY_MAX_MESSAGES", &v)?;
        }
        if let Some(v) = opt_var(lookup, "HISTORY_MAX_THREADS") {
            cfg.history_max_threads = parse("HISTORY_MAX_THREADS", &v)?;
        }
        if let Some(v) = opt_var(lookup, "GENERATION_TIMEOUT_SECS") {
            cfg.generation_timeout = Duration::from_secs(parse("GENERATION_TIMEOUT_SECS", &v)?);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks limits that hand-built configs could get wrong.
    pub fn validate(&self) -> Result<(), ContextorError> {
        if self.history_max_messages < MIN_MESSAGES_PER_THREAD {
            return Err(ContextorError::Config(format!(
                "HISTORY_MAX_MESSAGES must hold at least one exchange (>= {MIN_MESSAGES_PER_THREAD})"
            )));
        }
        if self.history_max_threads == 0 {
            return Err(ContextorError::Config(
                "HISTORY_MAX_THREADS must be > 0".into(),
            ));
        }
        if self.generation_timeout.is_zero() {
            return Err(ContextorError::Config(
                "GENERATION_TIMEOUT_SECS must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ContextorError> {
    value
        .parse::<T>()
        .map_err(|_| ContextorError::Config(format!("{var}: cannot parse `{value}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = ContextorConfig::from_lookup(&env(&[])).unwrap();
        assert_eq!(cfg.default_thread_id, "default");
        assert_eq!(cfg.history_window, 20);
        assert_eq!(cfg.history_max_messages, 200);
        assert_eq!(cfg.history_max_threads, 1_000);
        assert_eq!(cfg.generation_timeout, Duration::from_secs(60));
        assert!(cfg.persona_path.is_none());
    }

    #[test]
    fn overrides_and_validation() {
        let cfg = ContextorConfig::from_lookup(&env(&[
            ("DEFAULT_THREAD_ID", "abc123"),
            ("HISTORY_WINDOW", "4"),
            ("GENERATION_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(cfg.default_thread_id, "abc123");
        assert_eq!(cfg.history_window, 4);
        assert_eq!(cfg.generation_timeout, Duration::from_secs(5));

        assert!(ContextorConfig::from_lookup(&env(&[("HISTORY_MAX_MESSAGES", "1")])).is_err());
        assert!(ContextorConfig::from_lookup(&env(&[("HISTORY_WINDOW", "-1")])).is_err());
        assert!(ContextorConfig::from_lookup(&env(&[("GENERATION_TIMEOUT_SECS", "0")])).is_err());
        assert!(ContextorConfig::from_lookup(&env(&[("HISTORY_MAX_THREADS", "0")])).is_err());
        assert_eq!(
            ContextorConfig::from_lookup(&env(&[("HISTORY_MAX_THREADS", "50")]))
                .unwrap()
                .history_max_threads,
            50
        );
    }

    #[test]
    fn hand_built_configs_are_validated_too() {
        let cfg = ContextorConfig {
            history_max_messages: 1,
            ..ContextorConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ContextorError::Config(_))));
        assert!(ContextorConfig::default().validate().is_ok());
    }
}
