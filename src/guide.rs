//! Guide tables: canned replies and the deterministic brew-guidance rules.
//!
//! DESIGN
//! ======
//! All user-facing copy lives here as data. The rule table is scanned in
//! order and the first matching rule renders the reply; the quick plan is
//! the terminal default. The server-side fallback table used by the
//! concierge endpoint is kept alongside so both surfaces share one source of
//! copy.

use std::sync::LazyLock;

use rand::Rng;
use rand::seq::IndexedRandom;
use regex::Regex;

use crate::classify::{self, BrewBase, PromptKind};

// =============================================================================
// CANNED REPLIES
// =============================================================================

pub const GREETINGS: [&str; 3] = [
    "Hey! I can help with V60, espresso, matcha, ratios, grind size, and extraction fixes. What are you brewing?",
    "Hi. Tell me your brew method and taste issue, and I\u{2019}ll give a tight dial-in plan.",
    "Hey there. Want help with V60, espresso, matcha, or grinder/ratio setup?",
];

pub const SCOPE_REPLY: &str = "I\u{2019}m focused on coffee and matcha brewing at AG Brew Lab. Ask me about recipes, extraction, grind, temperature, or brew ratios.";

pub const EMPTY_REPLY: &str = "Ask a specific brew question and I will give a precise step plan.";

pub const APOLOGY_REPLY: &str = "I hit an issue generating that. Please try rephrasing your brew question.";

pub const SERVER_GREETING: &str =
    "Hey. Share your brew method and taste issue, and I will give a precise dial-in plan.";

pub const SERVER_SCOPE_REPLY: &str =
    "I focus on coffee and matcha brewing at AG Brew Lab. Ask about recipes, extraction, grind, temperature, or ratios.";

/// Pick one of the three greetings.
pub fn greeting<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    GREETINGS.choose(rng).copied().unwrap_or(GREETINGS[0])
}

// =============================================================================
// RULE TABLE
// =============================================================================

/// Input to the rule table: the normalised message plus remembered topic.
#[derive(Debug, Clone, Copy)]
pub struct GuideQuery<'a> {
    pub text: &'a str,
    pub brew_base: BrewBase,
}

impl GuideQuery<'_> {
    fn has(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }
}

/// How a matched rule produces its reply.
#[derive(Debug, Clone, Copy)]
pub enum GuideBody {
    /// Static lines joined with newlines.
    Lines(&'static [&'static str]),
    /// Dose-based V60 water calculation.
    V60Water,
}

pub struct GuideRule {
    pub name: &'static str,
    pub applies: fn(&GuideQuery<'_>) -> bool,
    pub body: GuideBody,
}

pub const V60_WATER_RATIO: f64 = 16.5;

static GRAMS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| classify::compile(r"(\d+(?:\.\d+)?)\s*g\b"));

const MATCHA_CARAMEL: &[&str] = &[
    "Leftover matcha + caramel iced recipe:",
    "1. Sift 2g matcha into a bowl.",
    "2. Add 65ml water at 80C and whisk for 20s.",
    "3. Thin 8-12g caramel sauce with 10ml warm water.",
    "4. Add caramel to a glass, then ice + 150ml cold milk.",
    "5. Pour in matcha and stir lightly.",
    "6. Optional: a tiny pinch of salt to balance sweetness.",
];

const CARAMEL: &[&str] = &[
    "Caramel add-in guide:",
    "1. Start with 8-10g caramel per 240ml drink.",
    "2. Dissolve caramel in hot espresso/coffee first for smooth mixing.",
    "3. For iced drinks, add 10-15ml warm water to thin the caramel.",
    "4. If sweetness is high, add 20-30ml extra milk/water.",
];

const SOUR_V60: &[&str] = &[
    "Fix sour V60 extraction:",
    "1. Keep dose 18g and water 300g (1:16.7).",
    "2. Grind 1-2 clicks finer.",
    "3. Raise water temp to 94C.",
    "4. Extend total brew time to ~2:50-3:05.",
    "5. Pour slower in smaller pulses after bloom.",
];

const BITTER: &[&str] = &[
    "Fix bitterness quickly:",
    "1. Go 1 step coarser.",
    "2. Drop water temp by 1-2C.",
    "3. Reduce agitation and finish 10-20s earlier.",
    "4. Recheck target ratio: start at 1:16 for filter.",
];

const RATIOS: &[&str] = &[
    "Useful brew ratios:",
    "- V60: 1:16 to 1:17",
    "- French press: 1:15",
    "- AeroPress: 1:14 to 1:16",
    "- Cold brew concentrate: 1:6",
    "- Matcha usucha: 2g to 70ml",
];

const MATCHA_STRONG: &[&str] = &[
    "Strong iced matcha (AG style):",
    "1. Sift 2.5g matcha.",
    "2. Add 60ml water at 80C and whisk 20s.",
    "3. Pour over 140-170ml cold milk + ice.",
    "4. Optional: 6-8g syrup for balance.",
];

const MATCHA_BASELINE: &[&str] = &[
    "Matcha baseline:",
    "1. Sift 2g matcha.",
    "2. Add 70ml water at 79-82C.",
    "3. Whisk zig-zag until microfoam forms (~20s).",
];

const ESPRESSO: &[&str] = &[
    "Espresso starter profile:",
    "- Dose: 18g in",
    "- Yield: 36g out",
    "- Time: 27-31s",
    "- Temp: 92-94C",
    "Tune finer for sour, coarser for bitter/astringent.",
];

const BREW_TIMES: &[&str] = &[
    "Target brew windows:",
    "- V60 (18g/300g): 2:40-3:05",
    "- AeroPress: 1:45-2:15 total",
    "- French press: 4:00 steep",
    "- Espresso: 27-31s",
];

const TEMPERATURES: &[&str] = &[
    "Temperature guide:",
    "- Light roasts: 93-96C",
    "- Medium roasts: 91-94C",
    "- Dark roasts: 88-92C",
    "- Matcha: 79-82C",
];

pub const QUICK_PLAN: &[&str] = &[
    "AG Brew Lab quick plan:",
    "1. Choose method + dose (example: 18g V60).",
    "2. Start at 1:16.5 ratio.",
    "3. Dial grind using taste: sour=finer, bitter=coarser.",
    "4. Tune temp by roast level (90-95C range).",
];

/// Ordered rule table. The first rule whose predicate holds (and, for the
/// calculator, whose dose parses) wins.
pub static RULES: &[GuideRule] = &[
    GuideRule {
        name: "matcha_caramel",
        applies: |q| q.has("caramel") && (q.has("matcha") || q.brew_base == BrewBase::Matcha),
        body: GuideBody::Lines(MATCHA_CARAMEL),
    },
    GuideRule { name: "caramel", applies: |q| q.has("caramel"), body: GuideBody::Lines(CARAMEL) },
    GuideRule {
        name: "sour_v60",
        applies: |q| q.has("sour") && (q.has("v60") || q.has("pour")),
        body: GuideBody::Lines(SOUR_V60),
    },
    GuideRule { name: "bitter", applies: |q| q.has("bitter"), body: GuideBody::Lines(BITTER) },
    GuideRule { name: "ratio", applies: |q| q.has("ratio"), body: GuideBody::Lines(RATIOS) },
    GuideRule {
        name: "matcha_strong",
        applies: |q| q.has("matcha") && (q.has("strong") || q.has("latte")),
        body: GuideBody::Lines(MATCHA_STRONG),
    },
    GuideRule { name: "matcha", applies: |q| q.has("matcha"), body: GuideBody::Lines(MATCHA_BASELINE) },
    GuideRule { name: "espresso", applies: |q| q.has("espresso"), body: GuideBody::Lines(ESPRESSO) },
    GuideRule { name: "brew_time", applies: |q| q.has("time"), body: GuideBody::Lines(BREW_TIMES) },
    GuideRule { name: "temperature", applies: |q| q.has("temp"), body: GuideBody::Lines(TEMPERATURES) },
    GuideRule { name: "v60_water", applies: |q| q.has("v60"), body: GuideBody::V60Water },
];

impl GuideRule {
    fn render(&self, query: &GuideQuery<'_>) -> Option<String> {
        if !(self.applies)(query) {
            return None;
        }
        match self.body {
            GuideBody::Lines(lines) => Some(lines.join("\n")),
            GuideBody::V60Water => v60_water_reply(query.text),
        }
    }
}

/// Water mass for a V60 dose, rounded to the nearest gram.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn v60_water_grams(dose_grams: f64) -> i64 {
    (dose_grams * V60_WATER_RATIO).round() as i64
}

fn v60_water_reply(text: &str) -> Option<String> {
    let captures = GRAMS_RE.as_ref()?.captures(text)?;
    let Ok(dose) = captures.get(1)?.as_str().parse::<f64>() else {
        return None;
    };
    let water = v60_water_grams(dose);
    Some(format!(
        "For {dose}g coffee on V60, start with {water}g water (1:16.5), 93C, and target 2:45-3:00 total drawdown."
    ))
}

/// Deterministic brew guidance for a message, given the remembered topic.
///
/// Non-brew prompts get the same canned replies the resolver would give, so
/// this function is total over any input.
pub fn guided_reply<R: Rng + ?Sized>(message: &str, brew_base: BrewBase, rng: &mut R) -> String {
    match classify::classify(message) {
        PromptKind::Empty => return EMPTY_REPLY.to_string(),
        PromptKind::Greeting => return greeting(rng).to_string(),
        PromptKind::Unknown => return SCOPE_REPLY.to_string(),
        PromptKind::Brew => {}
    }

    let text = classify::normalize(message);
    let query = GuideQuery { text: &text, brew_base };
    RULES
        .iter()
        .find_map(|rule| {
            let reply = rule.render(&query)?;
            tracing::debug!(rule = rule.name, "guide: rule matched");
            Some(reply)
        })
        .unwrap_or_else(|| QUICK_PLAN.join("\n"))
}

// =============================================================================
// SERVER FALLBACK TABLE
// =============================================================================

/// Fallback copy used by the concierge endpoint when generation is
/// unavailable or rejected. Matched by substring against the lowercased
/// message, first match wins.
pub static SERVER_FALLBACKS: &[(&str, &[&str])] = &[
    (
        "sour",
        &[
            "Sour extraction fix:",
            "- Grind 1-2 steps finer.",
            "- Increase brew temp by 1-2C.",
            "- Extend contact time by 10-20 seconds.",
            "- Keep ratio near 1:16 for filter, then re-taste.",
        ],
    ),
    (
        "bitter",
        &[
            "Bitter extraction fix:",
            "- Grind slightly coarser.",
            "- Reduce water temp by 1-2C.",
            "- Shorten brew time and avoid over-stirring.",
            "- For espresso, shorten yield to reduce harsh tails.",
        ],
    ),
    (
        "matcha",
        &[
            "AG matcha baseline:",
            "- 2g matcha, 70ml water at 80C.",
            "- Whisk zig-zag for 20 seconds.",
            "- For iced latte: add 180ml cold milk over ice.",
            "- For stronger profile: 2.5g matcha, 60ml water.",
        ],
    ),
];

pub const SERVER_BASELINE: &[&str] = &[
    "Coffee baseline (manual brew):",
    "- Dose: 20g coffee.",
    "- Water: 320ml at 92-93C.",
    "- Ratio: 1:16.",
    "- Bloom: 40s, then pulse pour to finish around 2:45.",
];

#[must_use]
pub fn server_fallback_reply(message: &str) -> String {
    let lowered = message.to_lowercase();
    SERVER_FALLBACKS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map_or(SERVER_BASELINE, |(_, lines)| *lines)
        .join("\n")
}

#[cfg(test)]
#[path = "guide_test.rs"]
mod tests;
