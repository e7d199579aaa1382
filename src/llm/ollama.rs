//! Local-runtime (Ollama) generation backend.
//!
//! Thin HTTP wrapper for `/api/tags` and `/api/generate`. Loading checks
//! that the configured model is installed; generation maps
//! [`GenerationOptions`] onto the runtime's sampling options. Pure parsing in
//! `parse_tags` / `parse_generate` for testability.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::config::GeneratorConfig;
use super::types::{GeneratedText, GenerationOptions, GeneratorLoader, LlmError, TextGenerator};

// =============================================================================
// LOADER
// =============================================================================

pub struct OllamaLoader {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaLoader {
    /// # Errors
    ///
    /// Returns [`LlmError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: &GeneratorConfig) -> Result<Self, LlmError> {
        // Generation has its own deadline; the client only bounds connects.
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeouts.connect)
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.clone(), model: config.model.clone() })
    }
}

#[async_trait]
impl GeneratorLoader for OllamaLoader {
    fn model(&self) -> &str {
        &self.model
    }

    async fn load(&self) -> Result<Arc<dyn TextGenerator>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LlmError::Load(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Load(e.to_string()))?;
        if status != 200 {
            return Err(LlmError::ApiResponse { status, body: text });
        }

        let installed = parse_tags(&text)?;
        if !has_model(&installed, &self.model) {
            return Err(LlmError::ModelUnavailable { model: self.model.clone() });
        }

        tracing::info!(model = %self.model, "ollama: model ready");
        Ok(Arc::new(OllamaGenerator {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
        }))
    }
}

// =============================================================================
// GENERATOR
// =============================================================================

pub struct OllamaGenerator {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Vec<GeneratedText>, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest::new(&self.model, prompt, options);

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;
        if status != 200 {
            return Err(LlmError::ApiResponse { status, body: text });
        }

        let generated = parse_generate(&text)?;
        if options.return_full_text {
            return Ok(vec![GeneratedText { generated_text: format!("{prompt}{generated}") }]);
        }
        Ok(vec![GeneratedText { generated_text: generated }])
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: RuntimeOptions,
}

#[derive(Serialize)]
struct RuntimeOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
    repeat_penalty: f32,
}

impl<'a> GenerateRequest<'a> {
    fn new(model: &'a str, prompt: &'a str, options: &GenerationOptions) -> Self {
        // Greedy decoding when sampling is off.
        let temperature = if options.do_sample { options.temperature } else { 0.0 };
        Self {
            model,
            prompt,
            stream: false,
            options: RuntimeOptions {
                num_predict: options.max_new_tokens,
                temperature,
                top_p: options.top_p,
                repeat_penalty: options.repetition_penalty,
            },
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_generate(json: &str) -> Result<String, LlmError> {
    let parsed: GenerateResponse = serde_json::from_str(json).map_err(|e| LlmError::ApiParse(e.to_string()))?;
    Ok(parsed.response)
}

fn parse_tags(json: &str) -> Result<Vec<String>, LlmError> {
    let parsed: TagsResponse = serde_json::from_str(json).map_err(|e| LlmError::ApiParse(e.to_string()))?;
    Ok(parsed.models.into_iter().map(|m| m.name).collect())
}

/// `true` when `model` is installed. An untagged name matches `:latest`.
fn has_model(installed: &[String], model: &str) -> bool {
    installed
        .iter()
        .any(|name| name == model || (!model.contains(':') && *name == format!("{model}:latest")))
}

#[cfg(test)]
#[path = "ollama_test.rs"]
mod tests;
