//! Quality gate: sanitising and judging generated replies.
//!
//! DESIGN
//! ======
//! Generated text (remote or on-device) is only shown when it is both clean
//! and on topic. The garbage heuristics are density and repetition checks
//! whose thresholds are carried in [`QualityThresholds`] so deployments can
//! tune them without touching the checks themselves.
//!
//! The deterministic guide is never run through this gate.

use std::sync::LazyLock;

use regex::Regex;

use crate::classify::{self, PromptKind, compile, matches};

pub const DEFAULT_MIN_GARBAGE_LEN: usize = 12;
pub const DEFAULT_MIN_CLEAN_LEN: usize = 18;
pub const DEFAULT_MAX_REPLY_CHARS: usize = 820;
pub const DEFAULT_MAX_CHAR_RUN: usize = 8;
pub const DEFAULT_MIN_PRINTABLE_RATIO: f64 = 0.96;
pub const DEFAULT_MIN_ALNUM_RATIO: f64 = 0.36;

static SUSPICIOUS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"(?i)(___|<unk>|```|https?://|@@@)"));
static GREETING_REPLY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"(?i)\b(hey|hi|hello|brew|coffee|matcha)\b"));
static SCOPE_REPLY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"(?i)\b(coffee|matcha|brew)\b"));
static QUANTITY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"(?i)\d+\s?(g|ml|c|°c|sec|min)"));

static LEADING_ROLE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"(?i)^(answer:|assistant:)\s*"));
static HTML_TAG_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"</?[^>]+(>|$)"));
static ANSI_ESCAPE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"\x1b\[[0-9;?]*[ -/]*[@-~]"));
static BLANK_LINES_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"\n{3,}"));
static UNDERSCORE_RUN_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"_{3,}"));

// =============================================================================
// THRESHOLDS
// =============================================================================

/// Tunable limits for the garbage heuristics and output cleaning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    /// Replies shorter than this are garbage.
    pub min_len: usize,
    /// Cleaned model output shorter than this is discarded.
    pub min_clean_len: usize,
    /// Cleaned model output is truncated to this many characters.
    pub max_reply_chars: usize,
    /// A single character repeated this many times in a row is garbage.
    pub max_char_run: usize,
    pub min_printable_ratio: f64,
    pub min_alnum_ratio: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_GARBAGE_LEN,
            min_clean_len: DEFAULT_MIN_CLEAN_LEN,
            max_reply_chars: DEFAULT_MAX_REPLY_CHARS,
            max_char_run: DEFAULT_MAX_CHAR_RUN,
            min_printable_ratio: DEFAULT_MIN_PRINTABLE_RATIO,
            min_alnum_ratio: DEFAULT_MIN_ALNUM_RATIO,
        }
    }
}

/// Why a reply failed the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooShort,
    SuspiciousToken,
    RepeatedCharacter,
    LowPrintableDensity,
    LowAlphanumericDensity,
    OffTopic,
}

impl Rejection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TooShort => "too_short",
            Self::SuspiciousToken => "suspicious_token",
            Self::RepeatedCharacter => "repeated_character",
            Self::LowPrintableDensity => "low_printable_density",
            Self::LowAlphanumericDensity => "low_alphanumeric_density",
            Self::OffTopic => "off_topic",
        }
    }
}

// =============================================================================
// GATE
// =============================================================================

impl QualityThresholds {
    /// Return the first garbage heuristic `text` trips, if any.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn garbage(&self, text: &str) -> Option<Rejection> {
        let len = text.chars().count();
        if len < self.min_len {
            return Some(Rejection::TooShort);
        }
        if matches(SUSPICIOUS_RE.as_ref(), text) {
            return Some(Rejection::SuspiciousToken);
        }
        if longest_char_run(text) >= self.max_char_run {
            return Some(Rejection::RepeatedCharacter);
        }

        let printable = text
            .chars()
            .filter(|c| matches!(c, ' '..='~' | '\n' | '\r' | '\t'))
            .count();
        if (printable as f64) / (len as f64) < self.min_printable_ratio {
            return Some(Rejection::LowPrintableDensity);
        }

        let alnum = text.chars().filter(char::is_ascii_alphanumeric).count();
        if (alnum as f64) / (len as f64) < self.min_alnum_ratio {
            return Some(Rejection::LowAlphanumericDensity);
        }
        None
    }

    #[must_use]
    pub fn looks_like_garbage(&self, text: &str) -> bool {
        self.garbage(text).is_some()
    }

    /// Full gate: garbage heuristics, then topic relevance for the class of
    /// the prompt that produced `reply`.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] describing the first failed check.
    pub fn check(&self, message: &str, reply: &str) -> Result<(), Rejection> {
        if let Some(rejection) = self.garbage(reply) {
            return Err(rejection);
        }
        if is_on_topic(classify::classify(message), reply) {
            Ok(())
        } else {
            Err(Rejection::OffTopic)
        }
    }

    #[must_use]
    pub fn is_reply_useful(&self, message: &str, reply: &str) -> bool {
        self.check(message, reply).is_ok()
    }

    /// Strip artifacts from raw model output. Returns `None` when nothing
    /// usable is left.
    #[must_use]
    pub fn sanitize(&self, raw: &str) -> Option<String> {
        let mut cleaned = raw.trim().to_string();
        cleaned = replace(LEADING_ROLE_RE.as_ref(), &cleaned, "");
        cleaned = replace(HTML_TAG_RE.as_ref(), &cleaned, "");
        cleaned = replace(ANSI_ESCAPE_RE.as_ref(), &cleaned, "");
        cleaned.retain(|c| !c.is_control() || matches!(c, '\n' | '\t'));
        cleaned = replace(BLANK_LINES_RE.as_ref(), &cleaned, "\n\n");
        cleaned = replace(UNDERSCORE_RUN_RE.as_ref(), &cleaned, " ");
        let cleaned = cleaned.trim();

        if cleaned.chars().count() < self.min_clean_len {
            return None;
        }
        Some(cleaned.chars().take(self.max_reply_chars).collect())
    }
}

fn is_on_topic(kind: PromptKind, reply: &str) -> bool {
    match kind {
        PromptKind::Greeting => matches(GREETING_REPLY_RE.as_ref(), reply),
        PromptKind::Unknown => matches(SCOPE_REPLY_RE.as_ref(), reply),
        PromptKind::Brew | PromptKind::Empty => {
            classify::mentions_brew_vocabulary(reply) || matches(QUANTITY_RE.as_ref(), reply)
        }
    }
}

fn replace(re: Option<&Regex>, text: &str, with: &str) -> String {
    match re {
        Some(re) => re.replace_all(text, with).into_owned(),
        None => text.to_string(),
    }
}

/// Length of the longest run of one repeated character. Newlines never
/// count toward a run.
fn longest_char_run(text: &str) -> usize {
    let mut longest = 0;
    let mut run = 0;
    let mut prev = None;
    for c in text.chars() {
        if c == '\n' {
            run = 0;
            prev = None;
            continue;
        }
        if prev == Some(c) {
            run += 1;
        } else {
            run = 1;
            prev = Some(c);
        }
        longest = longest.max(run);
    }
    longest
}

#[cfg(test)]
#[path = "quality_test.rs"]
mod tests;
