use super::*;
use crate::testing::{FixedLoader, cached};

fn concierge(loader: &Arc<FixedLoader>) -> Concierge {
    Concierge::new(cached(loader), QualityThresholds::default())
}

#[test]
fn prompt_defaults_page_and_flattens_message() {
    let prompt = build_concierge_prompt("  sour\nv60  ", "   ");
    assert!(prompt.contains("Page context: general.\n"));
    assert!(prompt.contains("Customer request: sour v60\n"));
    assert!(prompt.ends_with("Assistant reply:\n"));

    let prompt = build_concierge_prompt("sour v60", "recipes");
    assert!(prompt.contains("Page context: recipes.\n"));
}

#[test]
fn output_is_cut_at_echoed_markers() {
    assert_eq!(
        cut_at_markers("Grind finer.\nCustomer request: more?\nAssistant reply: sure"),
        "Grind finer."
    );
    assert_eq!(cut_at_markers(" Brew hotter. Assistant reply: x"), "Brew hotter.");
    assert_eq!(cut_at_markers("plain"), "plain");
}

#[tokio::test]
async fn canned_prompts_never_load_the_model() {
    let loader = Arc::new(FixedLoader::replying("unused"));
    let concierge = concierge(&loader);

    let reply = concierge.reply("hello", "home").await;
    assert_eq!(reply.reply, guide::SERVER_GREETING);
    assert!(!reply.degraded);
    assert_eq!(reply.warning, None);

    let reply = concierge.reply("best pizza in town?", "home").await;
    assert_eq!(reply.reply, guide::SERVER_SCOPE_REPLY);
    assert!(!concierge.generator().is_loaded());
    assert!(loader.prompts().is_empty());
}

#[tokio::test]
async fn accepted_generation_is_returned_clean() {
    let loader = Arc::new(FixedLoader::replying(
        "Grind 1 step finer and brew at 94C for 3:00.\nCustomer request: thanks",
    ));
    let concierge = concierge(&loader);

    let reply = concierge.reply("my v60 is sour", "recipes").await;
    assert_eq!(reply.reply, "Grind 1 step finer and brew at 94C for 3:00.");
    assert!(!reply.degraded);
    assert_eq!(reply.engine, "fixed-model");
    assert!(loader.prompts()[0].contains("Page context: recipes."));
}

#[tokio::test]
async fn failures_degrade_to_fallback_table() {
    let loader = Arc::new(FixedLoader::failing());
    let reply = concierge(&loader).reply("my v60 is sour", "").await;
    assert!(reply.degraded);
    assert!(reply.reply.starts_with("Sour extraction fix:"));
    assert!(reply.warning.unwrap().starts_with("Generation failed:"));

    let loader = Arc::new(FixedLoader::replying("@@@@@@@@@@@@@@@@@@@@@@@@@@@@"));
    let reply = concierge(&loader).reply("matcha recipe", "").await;
    assert!(reply.degraded);
    assert!(reply.reply.starts_with("AG matcha baseline:"));
    assert_eq!(reply.warning.as_deref(), Some(QUALITY_WARNING));
}
