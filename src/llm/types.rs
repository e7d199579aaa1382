//! Generation types: provider-neutral options, output, errors and traits.
//!
//! The on-device strategy and the concierge endpoint both talk to a
//! [`TextGenerator`], obtained through a [`GeneratorLoader`]. Tests mock
//! both traits.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced while loading or running a text generator.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The generation backend does not provide the requested model.
    #[error("model unavailable: {model}")]
    ModelUnavailable { model: String },

    /// Loading the generator did not finish in time.
    #[error("model load timed out after {0:?}")]
    LoadTimeout(Duration),

    /// Loading the generator failed.
    #[error("model load failed: {0}")]
    Load(String),

    /// Generation did not finish in time.
    #[error("generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    /// The HTTP request to the backend failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The backend returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The backend response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for LlmError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::ModelUnavailable { .. } => "E_MODEL_UNAVAILABLE",
            Self::LoadTimeout(_) => "E_MODEL_LOAD_TIMEOUT",
            Self::Load(_) => "E_MODEL_LOAD",
            Self::GenerationTimeout(_) => "E_GENERATION_TIMEOUT",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(
            self,
            Self::LoadTimeout(_)
                | Self::Load(_)
                | Self::ApiRequest(_)
                | Self::ApiResponse { status: 429 | 500..=599, .. }
        )
    }
}

// =============================================================================
// OPTIONS & OUTPUT
// =============================================================================

/// Sampling parameters passed to every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_new_tokens: u32,
    pub do_sample: bool,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub return_full_text: bool,
}

impl GenerationOptions {
    /// Parameters for the in-chat on-device fallback.
    pub const ON_DEVICE: Self = Self {
        max_new_tokens: 130,
        do_sample: true,
        temperature: 0.55,
        top_p: 0.92,
        repetition_penalty: 1.08,
        return_full_text: false,
    };

    /// Parameters for the concierge endpoint.
    pub const CONCIERGE: Self = Self {
        max_new_tokens: 170,
        do_sample: true,
        temperature: 0.75,
        top_p: 0.92,
        repetition_penalty: 1.18,
        return_full_text: false,
    };
}

/// One generated sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedText {
    pub generated_text: String,
}

// =============================================================================
// TRAITS
// =============================================================================

/// A loaded text-generation pipeline.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run generation for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the backend call fails or its output is
    /// malformed.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Vec<GeneratedText>, LlmError>;
}

/// Constructs a [`TextGenerator`]. Loading may be slow (model download,
/// warm-up), so callers cache the result.
#[async_trait::async_trait]
pub trait GeneratorLoader: Send + Sync {
    /// Name of the model this loader produces, for logs and health output.
    fn model(&self) -> &str;

    /// Load the generator.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the model cannot be made ready.
    async fn load(&self) -> Result<Arc<dyn TextGenerator>, LlmError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
