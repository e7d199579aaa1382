//! Reply resolution for one user message.
//!
//! Non-brew prompts get canned replies and never touch a network or model.
//! Brew prompts update the remembered brew base, then walk the strategy chain
//! in order; the first strategy whose reply is accepted wins.

use std::sync::Arc;

use tracing::{debug, info};

use crate::classify::{self, BrewBase, PromptKind};
use crate::config::AssistantConfig;
use crate::error::ErrorCode;
use crate::guide;
use crate::llm::CachedGenerator;
use crate::quality::QualityThresholds;
use crate::remote::{RemoteClient, RemoteError};
use crate::strategy::{OnDeviceStrategy, RemoteStrategy, Reply, ReplyContext, ReplyMode, ReplyStrategy, RuleBasedStrategy};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no reply strategy produced an answer")]
    Exhausted,
}

impl ErrorCode for ResolveError {
    fn error_code(&self) -> &'static str {
        "E_NO_REPLY"
    }
}

pub struct Resolver {
    strategies: Vec<Arc<dyn ReplyStrategy>>,
    quality: QualityThresholds,
}

impl Resolver {
    #[must_use]
    pub fn new(strategies: Vec<Arc<dyn ReplyStrategy>>, quality: QualityThresholds) -> Self {
        Self { strategies, quality }
    }

    /// The standard chain: remote concierge, on-device model, rule-based guide.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote HTTP client fails to build.
    pub fn standard(config: &AssistantConfig, generator: Arc<CachedGenerator>) -> Result<Self, RemoteError> {
        let client = RemoteClient::new(&config.endpoint, config.request_timeout)?;
        let strategies: Vec<Arc<dyn ReplyStrategy>> = vec![
            Arc::new(RemoteStrategy::new(client, config.page.clone(), config.trusts_local_service())),
            Arc::new(OnDeviceStrategy::new(generator, config.quality)),
            Arc::new(RuleBasedStrategy),
        ];
        Ok(Self::new(strategies, config.quality))
    }

    /// Resolve without progress notifications.
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve_with_progress`].
    pub async fn resolve(&self, message: &str, brew_base: &mut BrewBase) -> Result<Reply, ResolveError> {
        self.resolve_with_progress(message, brew_base, &|_| {}).await
    }

    /// Resolve `message`, calling `progress` with each strategy's mode just
    /// before it is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Exhausted`] when every strategy fails or is
    /// rejected. With the standard chain this cannot happen because the
    /// rule-based guide always answers.
    pub async fn resolve_with_progress(
        &self,
        message: &str,
        brew_base: &mut BrewBase,
        progress: &(dyn Fn(ReplyMode) + Send + Sync),
    ) -> Result<Reply, ResolveError> {
        let kind = classify::classify(message);
        let canned = match kind {
            PromptKind::Empty => Some(guide::EMPTY_REPLY),
            PromptKind::Greeting => Some(guide::greeting(&mut rand::rng())),
            PromptKind::Unknown => Some(guide::SCOPE_REPLY),
            PromptKind::Brew => None,
        };
        if let Some(text) = canned {
            debug!(kind = kind.as_str(), "resolver: canned reply");
            return Ok(Reply { text: text.to_string(), mode: ReplyMode::Guided });
        }

        let detected = classify::detect_brew_base(message);
        if !detected.is_none() {
            *brew_base = detected;
        }
        let context = ReplyContext { kind, brew_base: *brew_base };

        for strategy in &self.strategies {
            progress(strategy.mode());
            match strategy.attempt(message, &context).await {
                Ok(reply) if !strategy.gated() => return Ok(reply),
                Ok(reply) => match self.quality.check(message, &reply.text) {
                    Ok(()) => {
                        info!(strategy = strategy.name(), "resolver: reply accepted");
                        return Ok(reply);
                    }
                    Err(rejection) => {
                        info!(strategy = strategy.name(), reason = rejection.as_str(), "resolver: reply rejected");
                    }
                },
                Err(failure) => {
                    info!(strategy = strategy.name(), code = failure.error_code(), error = %failure, "resolver: strategy failed");
                }
            }
        }
        Err(ResolveError::Exhausted)
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
