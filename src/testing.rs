//! Shared test doubles for generators and strategies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::llm::config::GeneratorTimeouts;
use crate::llm::{CachedGenerator, GeneratedText, GenerationOptions, GeneratorLoader, LlmError, TextGenerator};
use crate::strategy::{Reply, ReplyContext, ReplyMode, ReplyStrategy, StrategyFailure};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that mutate process environment variables.
pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// GENERATOR
// =============================================================================

/// Generator that returns fixed text, or fails when `text` is `None`.
pub(crate) struct FixedGenerator {
    text: Option<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<Vec<GeneratedText>, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        match &self.text {
            Some(text) => Ok(vec![GeneratedText { generated_text: text.clone() }]),
            None => Err(LlmError::Load("generator offline".into())),
        }
    }
}

pub(crate) struct FixedLoader {
    text: Option<String>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl FixedLoader {
    pub(crate) fn replying(text: &str) -> Self {
        Self { text: Some(text.to_string()), prompts: Arc::default() }
    }

    pub(crate) fn failing() -> Self {
        Self { text: None, prompts: Arc::default() }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl GeneratorLoader for FixedLoader {
    fn model(&self) -> &str {
        "fixed-model"
    }

    async fn load(&self) -> Result<Arc<dyn TextGenerator>, LlmError> {
        Ok(Arc::new(FixedGenerator { text: self.text.clone(), prompts: Arc::clone(&self.prompts) }))
    }
}

/// Cached generator over `loader` with default timeouts.
pub(crate) fn cached(loader: &Arc<FixedLoader>) -> Arc<CachedGenerator> {
    Arc::new(CachedGenerator::new(
        Arc::clone(loader) as Arc<dyn GeneratorLoader>,
        GeneratorTimeouts::default(),
    ))
}

// =============================================================================
// STRATEGY
// =============================================================================

/// Strategy with a canned outcome that counts its attempts.
pub(crate) struct ScriptedStrategy {
    mode: ReplyMode,
    gated: bool,
    reply: Option<String>,
    attempts: AtomicUsize,
}

impl ScriptedStrategy {
    pub(crate) fn replying(mode: ReplyMode, text: &str) -> Self {
        Self { mode, gated: true, reply: Some(text.to_string()), attempts: AtomicUsize::new(0) }
    }

    pub(crate) fn failing(mode: ReplyMode) -> Self {
        Self { mode, gated: true, reply: None, attempts: AtomicUsize::new(0) }
    }

    pub(crate) fn ungated(mut self) -> Self {
        self.gated = false;
        self
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplyStrategy for ScriptedStrategy {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn mode(&self) -> ReplyMode {
        self.mode
    }

    fn gated(&self) -> bool {
        self.gated
    }

    async fn attempt(&self, _message: &str, _context: &ReplyContext) -> Result<Reply, StrategyFailure> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        match &self.reply {
            Some(text) => Ok(Reply { text: text.clone(), mode: self.mode }),
            None => Err(StrategyFailure::Skipped("scripted failure")),
        }
    }
}
