//! Assistant configuration parsed from environment variables.
//!
//! `ASSISTANT_HOSTNAME` plays the role of the page's hostname: it alone
//! decides whether the remote concierge is trusted enough to call.

use std::time::Duration;

use crate::error::ErrorCode;
use crate::llm::config::GeneratorConfig;
use crate::llm::types::LlmError;
use crate::quality::{self, QualityThresholds};
use crate::remote::DEFAULT_REQUEST_TIMEOUT_MS;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:4174/api/coffee-assistant";
pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_PAGE: &str = "unknown";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error(transparent)]
    Generator(#[from] LlmError),
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidValue { .. } => "E_CONFIG_INVALID",
            Self::Generator(e) => e.error_code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantConfig {
    /// Full URL of the concierge endpoint.
    pub endpoint: String,
    /// Hostname the assistant is served from.
    pub hostname: String,
    /// Page identifier sent with remote requests.
    pub page: String,
    pub request_timeout: Duration,
    pub generator: GeneratorConfig,
    pub quality: QualityThresholds,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            hostname: DEFAULT_HOSTNAME.to_string(),
            page: DEFAULT_PAGE.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            generator: GeneratorConfig::default(),
            quality: QualityThresholds::default(),
        }
    }
}

impl AssistantConfig {
    /// Build typed assistant config from environment variables.
    ///
    /// Optional:
    /// - `ASSISTANT_ENDPOINT`: default `http://127.0.0.1:4174/api/coffee-assistant`
    /// - `ASSISTANT_HOSTNAME`: default `localhost`
    /// - `ASSISTANT_PAGE`: default `unknown`
    /// - `ASSISTANT_REQUEST_TIMEOUT_MS`: default 8000
    /// - `QUALITY_MIN_PRINTABLE_RATIO`, `QUALITY_MIN_ALNUM_RATIO`,
    ///   `QUALITY_MAX_CHAR_RUN`, `QUALITY_MIN_LEN`: quality gate overrides
    /// - everything read by [`GeneratorConfig::from_env`]
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = QualityThresholds::default();
        let quality = QualityThresholds {
            min_len: env_parse("QUALITY_MIN_LEN", quality::DEFAULT_MIN_GARBAGE_LEN)?,
            max_char_run: env_parse("QUALITY_MAX_CHAR_RUN", quality::DEFAULT_MAX_CHAR_RUN)?,
            min_printable_ratio: env_ratio("QUALITY_MIN_PRINTABLE_RATIO", quality::DEFAULT_MIN_PRINTABLE_RATIO)?,
            min_alnum_ratio: env_ratio("QUALITY_MIN_ALNUM_RATIO", quality::DEFAULT_MIN_ALNUM_RATIO)?,
            ..defaults
        };

        Ok(Self {
            endpoint: env_string("ASSISTANT_ENDPOINT", DEFAULT_ENDPOINT),
            hostname: env_string("ASSISTANT_HOSTNAME", DEFAULT_HOSTNAME).to_lowercase(),
            page: env_string("ASSISTANT_PAGE", DEFAULT_PAGE),
            request_timeout: Duration::from_millis(env_parse("ASSISTANT_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?),
            generator: GeneratorConfig::from_env()?,
            quality,
        })
    }

    /// The concierge is only called from a trusted local host.
    #[must_use]
    pub fn trusts_local_service(&self) -> bool {
        is_trusted_host(&self.hostname)
    }
}

/// `localhost`, `127.0.0.1` and any `*.local` name.
#[must_use]
pub fn is_trusted_host(hostname: &str) -> bool {
    hostname == "localhost" || hostname == "127.0.0.1" || hostname.ends_with(".local")
}

fn env_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

fn env_parse<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(default);
    };
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue { key, value: raw })
}

fn env_ratio(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    let value = env_parse(key, default)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue { key, value: value.to_string() })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
