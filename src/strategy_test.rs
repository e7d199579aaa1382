use std::time::Duration;

use super::*;
use crate::testing::{FixedLoader, cached};

fn brew_context(brew_base: BrewBase) -> ReplyContext {
    ReplyContext { kind: PromptKind::Brew, brew_base }
}

#[test]
fn modes_serialize_to_wire_names() {
    assert_eq!(serde_json::to_string(&ReplyMode::OnDeviceModel).unwrap(), "\"browser-model\"");
    assert_eq!(ReplyMode::RuleBased.as_str(), "browser");
    assert_eq!(ReplyMode::Guided.status_text(), "Brew guidance mode active.");
    assert_eq!(ReplyMode::Server.status_text(), "AI server mode active.");
}

#[test]
fn on_device_prompt_includes_context_only_when_known() {
    let prompt = build_on_device_prompt("  how   much\nwater? ", BrewBase::Matcha);
    assert!(prompt.contains("Context: user is currently discussing matcha."));
    assert!(prompt.contains("User question:\nhow much water?\nAnswer:"));

    let prompt = build_on_device_prompt("grind size", BrewBase::None);
    assert!(!prompt.contains("Context:"));
    assert!(prompt.ends_with("Answer:"));
}

#[tokio::test]
async fn remote_is_skipped_on_untrusted_host() {
    let client = RemoteClient::new("http://127.0.0.1:9/api/coffee-assistant", Duration::from_secs(1)).unwrap();
    let strategy = RemoteStrategy::new(client, "home", false);
    let err = strategy.attempt("18g v60", &brew_context(BrewBase::None)).await.unwrap_err();
    assert!(matches!(err, StrategyFailure::Skipped(_)));
    assert_eq!(err.error_code(), "E_STRATEGY_SKIPPED");
}

#[tokio::test]
async fn on_device_sanitizes_generated_text() {
    let loader = Arc::new(FixedLoader::replying("Answer: <b>Grind finer</b> and brew at 93C for balance."));
    let strategy = OnDeviceStrategy::new(cached(&loader), QualityThresholds::default());

    let reply = strategy.attempt("sour v60", &brew_context(BrewBase::FilterCoffee)).await.unwrap();
    assert_eq!(reply.mode, ReplyMode::OnDeviceModel);
    assert_eq!(reply.text, "Grind finer and brew at 93C for balance.");
    assert!(loader.prompts()[0].contains("discussing filter coffee"));
}

#[tokio::test]
async fn on_device_rejects_short_output_and_surfaces_failures() {
    let loader = Arc::new(FixedLoader::replying("ok"));
    let strategy = OnDeviceStrategy::new(cached(&loader), QualityThresholds::default());
    let err = strategy.attempt("sour v60", &brew_context(BrewBase::None)).await.unwrap_err();
    assert!(matches!(err, StrategyFailure::Rejected(Rejection::TooShort)));

    let loader = Arc::new(FixedLoader::failing());
    let strategy = OnDeviceStrategy::new(cached(&loader), QualityThresholds::default());
    let err = strategy.attempt("sour v60", &brew_context(BrewBase::None)).await.unwrap_err();
    assert!(matches!(err, StrategyFailure::Generator(LlmError::Load(_))));
}

#[tokio::test]
async fn rule_based_always_answers() {
    let strategy = RuleBasedStrategy;
    assert!(!strategy.gated());
    let reply = strategy.attempt("18g v60", &brew_context(BrewBase::None)).await.unwrap();
    assert_eq!(reply.mode, ReplyMode::RuleBased);
    assert!(reply.text.contains("297g water"));
}
