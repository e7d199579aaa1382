//! Reply strategies: the ordered sources the resolver tries for brew
//! questions.
//!
//! DESIGN
//! ======
//! Each source implements [`ReplyStrategy`] with the same contract:
//! `attempt(message, context) -> Result<Reply, StrategyFailure>`. A failure
//! is never surfaced to the user; the resolver simply moves on. Strategies
//! that return generated text are `gated` and must also pass the quality
//! gate; the rule-based guide is not gated and always succeeds, so it goes
//! last.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::{BrewBase, PromptKind};
use crate::error::ErrorCode;
use crate::guide;
use crate::llm::{CachedGenerator, GenerationOptions, LlmError};
use crate::quality::{QualityThresholds, Rejection};
use crate::remote::{RemoteClient, RemoteError};

// =============================================================================
// TYPES
// =============================================================================

/// Which source produced the reply shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyMode {
    #[serde(rename = "server")]
    Server,
    #[serde(rename = "browser-model")]
    OnDeviceModel,
    #[serde(rename = "browser")]
    RuleBased,
    #[serde(rename = "guided")]
    Guided,
}

impl ReplyMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::OnDeviceModel => "browser-model",
            Self::RuleBased => "browser",
            Self::Guided => "guided",
        }
    }

    /// Status line shown after a reply from this mode.
    #[must_use]
    pub fn status_text(self) -> &'static str {
        match self {
            Self::Server => "AI server mode active.",
            Self::OnDeviceModel => "On-device AI mode active.",
            Self::Guided => "Brew guidance mode active.",
            Self::RuleBased => "Smart browser mode active.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub mode: ReplyMode,
}

/// What a strategy knows about the conversation when it is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyContext {
    pub kind: PromptKind,
    pub brew_base: BrewBase,
}

#[derive(Debug, thiserror::Error)]
pub enum StrategyFailure {
    #[error("skipped: {0}")]
    Skipped(&'static str),

    #[error("remote: {0}")]
    Remote(#[from] RemoteError),

    #[error("generator: {0}")]
    Generator(#[from] LlmError),

    #[error("rejected: {}", .0.as_str())]
    Rejected(Rejection),
}

impl ErrorCode for StrategyFailure {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Skipped(_) => "E_STRATEGY_SKIPPED",
            Self::Remote(e) => e.error_code(),
            Self::Generator(e) => e.error_code(),
            Self::Rejected(_) => "E_LOW_CONFIDENCE",
        }
    }
}

#[async_trait]
pub trait ReplyStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn mode(&self) -> ReplyMode;

    /// Whether replies from this strategy go through the quality gate.
    fn gated(&self) -> bool {
        true
    }

    /// Try to produce a reply.
    ///
    /// # Errors
    ///
    /// Returns a [`StrategyFailure`] when this source cannot answer; the
    /// resolver falls through to the next strategy.
    async fn attempt(&self, message: &str, context: &ReplyContext) -> Result<Reply, StrategyFailure>;
}

// =============================================================================
// REMOTE SERVER
// =============================================================================

/// Calls the concierge endpoint. Only attempted from a trusted host.
pub struct RemoteStrategy {
    client: RemoteClient,
    page: String,
    trusted: bool,
}

impl RemoteStrategy {
    #[must_use]
    pub fn new(client: RemoteClient, page: impl Into<String>, trusted: bool) -> Self {
        Self { client, page: page.into(), trusted }
    }
}

#[async_trait]
impl ReplyStrategy for RemoteStrategy {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn mode(&self) -> ReplyMode {
        ReplyMode::Server
    }

    async fn attempt(&self, message: &str, _context: &ReplyContext) -> Result<Reply, StrategyFailure> {
        if !self.trusted {
            return Err(StrategyFailure::Skipped("untrusted host"));
        }
        let text = self.client.ask(message, &self.page).await?;
        Ok(Reply { text, mode: ReplyMode::Server })
    }
}

// =============================================================================
// ON-DEVICE MODEL
// =============================================================================

/// Runs the cached local generator with a constrained prompt.
pub struct OnDeviceStrategy {
    generator: Arc<CachedGenerator>,
    options: GenerationOptions,
    quality: QualityThresholds,
}

impl OnDeviceStrategy {
    #[must_use]
    pub fn new(generator: Arc<CachedGenerator>, quality: QualityThresholds) -> Self {
        Self { generator, options: GenerationOptions::ON_DEVICE, quality }
    }
}

#[async_trait]
impl ReplyStrategy for OnDeviceStrategy {
    fn name(&self) -> &'static str {
        "on_device"
    }

    fn mode(&self) -> ReplyMode {
        ReplyMode::OnDeviceModel
    }

    async fn attempt(&self, message: &str, context: &ReplyContext) -> Result<Reply, StrategyFailure> {
        let prompt = build_on_device_prompt(message, context.brew_base);
        let raw = self.generator.generate(&prompt, &self.options).await?;
        debug!(raw_len = raw.len(), "on_device: generated");
        let text = self
            .quality
            .sanitize(&raw)
            .ok_or(StrategyFailure::Rejected(Rejection::TooShort))?;
        Ok(Reply { text, mode: ReplyMode::OnDeviceModel })
    }
}

/// Prompt for the small on-device model: topic rules, remembered context,
/// then the question.
#[must_use]
pub fn build_on_device_prompt(message: &str, brew_base: BrewBase) -> String {
    let clean = message.split_whitespace().collect::<Vec<_>>().join(" ");
    let context = if brew_base.is_none() {
        String::new()
    } else {
        format!("Context: user is currently discussing {}.", brew_base.as_str())
    };
    [
        "You are the AG Brew Lab assistant for coffee and matcha only.",
        "Rules:",
        "- Stay on-topic: coffee, espresso, filter brewing, matcha, grinder, ratios, extraction.",
        "- If greeting: give a short friendly greeting and ask what they are brewing.",
        "- If out-of-scope: politely redirect to coffee/matcha topics.",
        "- Keep responses concise and practical.",
        "- Include exact numbers only when relevant.",
        &context,
        "User question:",
        &clean,
        "Answer:",
    ]
    .join("\n")
}

// =============================================================================
// RULE-BASED GUIDE
// =============================================================================

/// Deterministic guide from the rule table. Always answers.
pub struct RuleBasedStrategy;

#[async_trait]
impl ReplyStrategy for RuleBasedStrategy {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    fn mode(&self) -> ReplyMode {
        ReplyMode::RuleBased
    }

    fn gated(&self) -> bool {
        false
    }

    async fn attempt(&self, message: &str, context: &ReplyContext) -> Result<Reply, StrategyFailure> {
        let text = guide::guided_reply(message, context.brew_base, &mut rand::rng());
        Ok(Reply { text, mode: ReplyMode::RuleBased })
    }
}

#[cfg(test)]
#[path = "strategy_test.rs"]
mod tests;
