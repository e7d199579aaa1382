//! LLM: lazily loaded text generation with bounded waits.
//!
//! DESIGN
//! ======
//! Loading a generator is slow and may fail, so [`CachedGenerator`] wraps a
//! [`GeneratorLoader`] in a `tokio::sync::OnceCell`:
//! - concurrent callers during a load wait on the same in-flight load;
//! - a successful load is reused for the life of the cache;
//! - a failed or timed-out load leaves the cell empty, so the next call
//!   retries.
//!
//! Both the load and every generation call are bounded by timeouts from
//! [`config::GeneratorTimeouts`].

pub mod config;
pub mod ollama;
pub mod types;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;
use tracing::{info, warn};

use config::{GeneratorConfig, GeneratorTimeouts};
pub use types::{GeneratedText, GenerationOptions, GeneratorLoader, LlmError, TextGenerator};

use crate::error::ErrorCode;

// =============================================================================
// CACHED GENERATOR
// =============================================================================

pub struct CachedGenerator {
    loader: Arc<dyn GeneratorLoader>,
    cell: OnceCell<Arc<dyn TextGenerator>>,
    timeouts: GeneratorTimeouts,
    last_error: Mutex<Option<String>>,
}

impl CachedGenerator {
    #[must_use]
    pub fn new(loader: Arc<dyn GeneratorLoader>, timeouts: GeneratorTimeouts) -> Self {
        Self { loader, cell: OnceCell::new(), timeouts, last_error: Mutex::new(None) }
    }

    /// Build a cache over the Ollama backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, LlmError> {
        let loader = ollama::OllamaLoader::new(config)?;
        Ok(Self::new(Arc::new(loader), config.timeouts))
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.loader.model()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Message of the most recent load or generation failure, cleared by the
    /// next success.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the loaded generator, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::LoadTimeout`] if the load exceeds the load timeout,
    /// or the loader's own error.
    pub async fn get(&self) -> Result<Arc<dyn TextGenerator>, LlmError> {
        let result = self
            .cell
            .get_or_try_init(|| async {
                info!(model = self.loader.model(), "llm: loading generator");
                match tokio::time::timeout(self.timeouts.load, self.loader.load()).await {
                    Ok(loaded) => loaded,
                    Err(_) => Err(LlmError::LoadTimeout(self.timeouts.load)),
                }
            })
            .await;

        match result {
            Ok(generator) => Ok(Arc::clone(generator)),
            Err(e) => {
                warn!(model = self.loader.model(), code = e.error_code(), error = %e, "llm: generator load failed");
                self.record_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Load (if needed) and run one generation, bounded by the generation
    /// timeout. Returns the first generated sequence.
    ///
    /// # Errors
    ///
    /// Returns the load error, [`LlmError::GenerationTimeout`], or the
    /// generator's own error.
    pub async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, LlmError> {
        let generator = self.get().await?;
        let output = match tokio::time::timeout(self.timeouts.generation, generator.generate(prompt, options)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                self.record_error(Some(e.to_string()));
                return Err(e);
            }
            Err(_) => {
                let e = LlmError::GenerationTimeout(self.timeouts.generation);
                self.record_error(Some(e.to_string()));
                return Err(e);
            }
        };
        self.record_error(None);
        Ok(output
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .unwrap_or_default())
    }

    fn record_error(&self, error: Option<String>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
