//! Generator configuration parsed from environment variables.

use std::time::Duration;

use super::types::LlmError;

pub const DEFAULT_GENERATOR_BASE_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_GENERATOR_MODEL: &str = "qwen2.5:0.5b";
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 45_000;
pub const DEFAULT_GENERATION_TIMEOUT_MS: u64 = 16_000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorTimeouts {
    pub load: Duration,
    pub generation: Duration,
    pub connect: Duration,
}

impl Default for GeneratorTimeouts {
    fn default() -> Self {
        Self {
            load: Duration::from_millis(DEFAULT_LOAD_TIMEOUT_MS),
            generation: Duration::from_millis(DEFAULT_GENERATION_TIMEOUT_MS),
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub model: String,
    pub timeouts: GeneratorTimeouts,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GENERATOR_BASE_URL.to_string(),
            model: DEFAULT_GENERATOR_MODEL.to_string(),
            timeouts: GeneratorTimeouts::default(),
        }
    }
}

impl GeneratorConfig {
    /// Build typed generator config from environment variables.
    ///
    /// Optional:
    /// - `GENERATOR_BASE_URL`: local runtime URL, default `http://127.0.0.1:11434`
    /// - `GENERATOR_MODEL`: model tag, default `qwen2.5:0.5b`
    /// - `GENERATOR_LOAD_TIMEOUT_MS`: default 45000
    /// - `GENERATOR_TIMEOUT_MS`: default 16000
    /// - `GENERATOR_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ConfigParse`] when a timeout is set but is not a
    /// positive integer, or the base URL is not http(s).
    pub fn from_env() -> Result<Self, LlmError> {
        let base_url = std::env::var("GENERATOR_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_GENERATOR_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(LlmError::ConfigParse(format!("GENERATOR_BASE_URL must be http(s): {base_url}")));
        }

        let model = std::env::var("GENERATOR_MODEL").unwrap_or_else(|_| DEFAULT_GENERATOR_MODEL.to_string());
        let timeouts = GeneratorTimeouts {
            load: Duration::from_millis(env_parse_u64("GENERATOR_LOAD_TIMEOUT_MS", DEFAULT_LOAD_TIMEOUT_MS)?),
            generation: Duration::from_millis(env_parse_u64("GENERATOR_TIMEOUT_MS", DEFAULT_GENERATION_TIMEOUT_MS)?),
            connect: Duration::from_secs(env_parse_u64("GENERATOR_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?),
        };

        Ok(Self { base_url, model, timeouts })
    }
}

fn env_parse_u64(key: &str, default: u64) -> Result<u64, LlmError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(LlmError::ConfigParse(format!("{key} must be a positive integer, got '{raw}'"))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
