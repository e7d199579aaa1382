//! Concierge: server-side reply generation for the HTTP endpoint.
//!
//! Non-brew prompts get fixed server copy. Brew prompts run the cached
//! generator with the concierge prompt; any load failure, generation failure
//! or rejected output degrades to the server fallback table with a warning.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classify::{self, PromptKind};
use crate::guide;
use crate::llm::{CachedGenerator, GenerationOptions};
use crate::quality::QualityThresholds;

pub const DEFAULT_PAGE_HINT: &str = "general";
pub const QUALITY_WARNING: &str = "Model output failed quality checks";

const STOP_MARKERS: [&str; 2] = ["Customer request:", "Assistant reply:"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConciergeReply {
    pub reply: String,
    pub engine: String,
    pub degraded: bool,
    pub warning: Option<String>,
}

pub struct Concierge {
    generator: Arc<CachedGenerator>,
    quality: QualityThresholds,
}

impl Concierge {
    #[must_use]
    pub fn new(generator: Arc<CachedGenerator>, quality: QualityThresholds) -> Self {
        Self { generator, quality }
    }

    #[must_use]
    pub fn generator(&self) -> &CachedGenerator {
        &self.generator
    }

    /// Answer `message`. Never fails; problems are reported through
    /// `degraded` and `warning`.
    pub async fn reply(&self, message: &str, page: &str) -> ConciergeReply {
        let (reply, warning) = match classify::classify(message) {
            PromptKind::Greeting => (guide::SERVER_GREETING.to_string(), None),
            PromptKind::Unknown => (guide::SERVER_SCOPE_REPLY.to_string(), None),
            PromptKind::Empty => (guide::EMPTY_REPLY.to_string(), None),
            PromptKind::Brew => match self.generate(message, page).await {
                Ok(reply) => (reply, None),
                Err(warning) => {
                    warn!(warning = %warning, "concierge: degraded to fallback");
                    (guide::server_fallback_reply(message), Some(warning))
                }
            },
        };

        ConciergeReply {
            reply,
            engine: self.generator.model().to_string(),
            degraded: warning.is_some(),
            warning,
        }
    }

    /// Generated reply, or the warning explaining why there is none.
    async fn generate(&self, message: &str, page: &str) -> Result<String, String> {
        self.generator
            .get()
            .await
            .map_err(|e| format!("Model load failed: {e}"))?;

        let prompt = build_concierge_prompt(message, page);
        let raw = self
            .generator
            .generate(&prompt, &GenerationOptions::CONCIERGE)
            .await
            .map_err(|e| format!("Generation failed: {e}"))?;

        let cleaned = self
            .quality
            .sanitize(cut_at_markers(&raw))
            .ok_or_else(|| QUALITY_WARNING.to_string())?;
        if let Err(rejection) = self.quality.check(message, &cleaned) {
            info!(reason = rejection.as_str(), "concierge: output rejected");
            return Err(QUALITY_WARNING.to_string());
        }
        Ok(cleaned)
    }
}

/// Prompt for the concierge model. A blank page falls back to `general`.
#[must_use]
pub fn build_concierge_prompt(message: &str, page: &str) -> String {
    let clean = message.trim().replace('\n', " ");
    let page_hint = match page.trim() {
        "" => DEFAULT_PAGE_HINT,
        hint => hint,
    };
    format!(
        "You are Brew Concierge for AG Brew Lab by Aishwarya Gawali. \
         The brand focuses on high-performance coffee and matcha rituals, weekly drops, and precise brew methods.\n\
         Response style rules:\n\
         1. Be concise, actionable, and specific.\n\
         2. Include exact grams, water volume, temperature, grind, and time when relevant.\n\
         3. Prefer practical step sequences and corrections over generic advice.\n\
         4. Keep tone professional and focused on the AG Brew Lab style.\n\
         Page context: {page_hint}.\n\
         Customer request: {clean}\n\
         Assistant reply:\n"
    )
}

/// Text before the first echoed prompt marker.
fn cut_at_markers(text: &str) -> &str {
    STOP_MARKERS
        .iter()
        .fold(text, |acc, marker| acc.split(marker).next().unwrap_or(acc))
        .trim()
}

#[cfg(test)]
#[path = "concierge_test.rs"]
mod tests;
