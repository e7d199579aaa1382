//! Prompt classification and brew-base detection.
//!
//! DESIGN
//! ======
//! Every incoming message is normalised (lowercased, whitespace collapsed,
//! trimmed) and sorted into one of four buckets. Only `Brew` prompts reach the
//! strategy chain; the other three are answered from canned text.
//!
//! The brew vocabulary is shared with the quality gate, which reuses
//! [`mentions_brew_vocabulary`] to decide whether a generated reply stays on
//! topic.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static BREW_SIGNAL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(
        r"(?i)\b(coffee|espresso|matcha|brew|grind|ratio|temperature|v60|pour[- ]?over|aeropress|chemex|french press|extraction|latte|cappuccino|filter|dripper|beans?|roast|caramel|syrup|sweetener|vanilla|mocha)\b",
    )
});

static GREETING_ONLY_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)^(hi|hey|hello|hey assistant|yo|hiya|sup|what's up)[\s!?.]*$"));

static MATCHA_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"\bmatcha\b"));
static ESPRESSO_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"\bespresso\b"));
static FILTER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"\b(v60|pour[- ]?over|filter|dripper|chemex|french press|aeropress)\b"));
static COFFEE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"\b(coffee|beans?|roast|latte|cappuccino)\b"));

/// Compile a built-in pattern. A bad literal is logged and treated as a
/// pattern that never matches.
pub(crate) fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(error = %e, pattern, "invalid built-in pattern");
            None
        }
    }
}

pub(crate) fn matches(re: Option<&Regex>, text: &str) -> bool {
    re.is_some_and(|re| re.is_match(text))
}

// =============================================================================
// TYPES
// =============================================================================

/// Category of a raw user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Empty,
    Greeting,
    Brew,
    Unknown,
}

impl PromptKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Greeting => "greeting",
            Self::Brew => "brew",
            Self::Unknown => "unknown",
        }
    }
}

/// The drink topic remembered across turns so follow-ups like "add caramel"
/// can be answered without restating the base drink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrewBase {
    #[default]
    None,
    Matcha,
    Espresso,
    FilterCoffee,
    Coffee,
}

impl BrewBase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Matcha => "matcha",
            Self::Espresso => "espresso",
            Self::FilterCoffee => "filter coffee",
            Self::Coffee => "coffee",
        }
    }

    #[must_use]
    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Lowercase, collapse runs of whitespace to single spaces, and trim.
#[must_use]
pub fn normalize(message: &str) -> String {
    message
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[must_use]
pub fn classify(message: &str) -> PromptKind {
    let normalized = normalize(message);
    if normalized.is_empty() {
        return PromptKind::Empty;
    }
    if matches(GREETING_ONLY_RE.as_ref(), &normalized) {
        return PromptKind::Greeting;
    }
    if matches(BREW_SIGNAL_RE.as_ref(), &normalized) {
        return PromptKind::Brew;
    }
    PromptKind::Unknown
}

/// Detect the drink a message is about. Earlier bases win: a message that
/// mentions both matcha and espresso is about matcha.
#[must_use]
pub fn detect_brew_base(message: &str) -> BrewBase {
    let normalized = normalize(message);
    if normalized.is_empty() {
        return BrewBase::None;
    }
    if matches(MATCHA_RE.as_ref(), &normalized) {
        BrewBase::Matcha
    } else if matches(ESPRESSO_RE.as_ref(), &normalized) {
        BrewBase::Espresso
    } else if matches(FILTER_RE.as_ref(), &normalized) {
        BrewBase::FilterCoffee
    } else if matches(COFFEE_RE.as_ref(), &normalized) {
        BrewBase::Coffee
    } else {
        BrewBase::None
    }
}

/// `true` when `text` contains any brew-vocabulary word (case-insensitive).
#[must_use]
pub fn mentions_brew_vocabulary(text: &str) -> bool {
    matches(BREW_SIGNAL_RE.as_ref(), text)
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
