use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;

use super::*;
use crate::quality::QualityThresholds;
use crate::remote::RemoteClient;
use crate::strategy::{OnDeviceStrategy, RemoteStrategy, Reply, ReplyContext, ReplyStrategy, RuleBasedStrategy, StrategyFailure};
use crate::testing::{FixedLoader, ScriptedStrategy, cached};

// =========================================================================
// Helpers
// =========================================================================

/// Echoes the message back after a delay.
struct SlowEcho {
    delay: Duration,
    mode: ReplyMode,
}

impl SlowEcho {
    fn new(delay: Duration) -> Self {
        Self { delay, mode: ReplyMode::RuleBased }
    }
}

#[async_trait]
impl ReplyStrategy for SlowEcho {
    fn name(&self) -> &'static str {
        "slow_echo"
    }

    fn mode(&self) -> ReplyMode {
        self.mode
    }

    fn gated(&self) -> bool {
        false
    }

    async fn attempt(&self, message: &str, _context: &ReplyContext) -> Result<Reply, StrategyFailure> {
        tokio::time::sleep(self.delay).await;
        Ok(Reply { text: format!("echo: {message}"), mode: self.mode })
    }
}

struct Exploding;

#[async_trait]
impl ReplyStrategy for Exploding {
    fn name(&self) -> &'static str {
        "exploding"
    }

    fn mode(&self) -> ReplyMode {
        ReplyMode::Server
    }

    async fn attempt(&self, _message: &str, _context: &ReplyContext) -> Result<Reply, StrategyFailure> {
        panic!("strategy blew up");
    }
}

fn session_with(strategies: Vec<Arc<dyn ReplyStrategy>>) -> (Arc<Session>, mpsc::UnboundedReceiver<SessionEvent>) {
    Session::new(Resolver::new(strategies, QualityThresholds::default()))
}

fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn replies(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Reply { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

fn statuses(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Status(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

// =========================================================================
// Queueing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn queued_messages_are_answered_in_order() {
    let (session, mut rx) = session_with(vec![Arc::new(SlowEcho::new(Duration::from_secs(1)))]);

    let first = tokio::spawn(session.submit("grind for v60 one"));
    assert!(session.is_busy());

    assert_eq!(session.submit("grind for v60 two").await, Submission::Queued { depth: 1 });
    assert_eq!(session.submit("grind for v60 three").await, Submission::Queued { depth: 2 });
    assert_eq!(session.queued(), 2);

    assert_eq!(first.await.unwrap(), Submission::Resolved { answered: 3 });
    assert!(!session.is_busy());
    assert_eq!(session.queued(), 0);

    let events = drain(&mut rx);
    assert_eq!(
        replies(&events),
        vec!["echo: grind for v60 one", "echo: grind for v60 two", "echo: grind for v60 three"]
    );
    assert!(statuses(&events).contains(&"Processing current reply. Queued: 2".to_string()));
}

#[tokio::test(start_paused = true)]
async fn blank_queued_messages_are_skipped() {
    let (session, mut rx) = session_with(vec![Arc::new(SlowEcho::new(Duration::from_secs(1)))]);

    let first = tokio::spawn(session.submit("espresso ratio"));
    assert!(session.is_busy());
    session.submit("   ").await;

    assert_eq!(first.await.unwrap(), Submission::Resolved { answered: 1 });
    assert_eq!(replies(&drain(&mut rx)), vec!["echo: espresso ratio"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spawned_submissions_are_answered_in_call_order() {
    let (session, mut rx) = session_with(vec![Arc::new(SlowEcho::new(Duration::from_millis(1)))]);
    let expected: Vec<String> = (0..8).map(|i| format!("echo: coffee {i}")).collect();

    for round in 0..25 {
        let mut submissions = JoinSet::new();
        for i in 0..8 {
            submissions.spawn(session.submit(format!("coffee {i}")));
        }
        while let Some(joined) = submissions.join_next().await {
            joined.unwrap();
        }
        assert_eq!(replies_of(&mut rx), expected, "round {round}");
        assert!(!session.is_busy());
    }
}

#[test]
fn dropped_submission_releases_busy_flag() {
    let (session, _rx) = session_with(vec![Arc::new(SlowEcho::new(Duration::from_secs(1)))]);

    let pending = session.submit("espresso ratio");
    assert!(session.is_busy());
    drop(pending);
    assert!(!session.is_busy());
}

// =========================================================================
// Resolution
// =========================================================================

#[tokio::test]
async fn failed_sources_fall_through_to_rule_based_guide() {
    let client = RemoteClient::new("http://127.0.0.1:9/api/coffee-assistant", Duration::from_secs(1)).unwrap();
    let loader = Arc::new(FixedLoader::failing());
    let strategies: Vec<Arc<dyn ReplyStrategy>> = vec![
        Arc::new(RemoteStrategy::new(client, "home", false)),
        Arc::new(OnDeviceStrategy::new(cached(&loader), QualityThresholds::default())),
        Arc::new(RuleBasedStrategy),
    ];
    let (session, mut rx) = session_with(strategies);

    assert_eq!(session.submit("18g v60").await, Submission::Resolved { answered: 1 });
    let events = drain(&mut rx);

    assert_eq!(
        events,
        vec![
            SessionEvent::Status(THINKING_STATUS.into()),
            SessionEvent::Status(LOADING_MODEL_STATUS.into()),
            SessionEvent::Reply {
                text: "For 18g coffee on V60, start with 297g water (1:16.5), 93C, and target 2:45-3:00 total drawdown."
                    .into(),
                mode: ReplyMode::RuleBased,
            },
            SessionEvent::Status("Smart browser mode active.".into()),
        ]
    );
    assert_eq!(session.mode(), ReplyMode::RuleBased);
    assert_eq!(session.brew_base(), BrewBase::FilterCoffee);
}

#[tokio::test]
async fn remembered_matcha_context_shapes_follow_up() {
    let (session, mut rx) = session_with(vec![Arc::new(RuleBasedStrategy)]);

    session.submit("iced matcha please").await;
    assert_eq!(session.brew_base(), BrewBase::Matcha);
    drain(&mut rx);

    session.submit("add caramel").await;
    assert!(replies_of(&mut rx)[0].starts_with("Leftover matcha + caramel iced recipe:"));

    session.reset();
    assert_eq!(session.brew_base(), BrewBase::None);
    session.submit("add caramel").await;
    assert!(replies_of(&mut rx)[0].starts_with("Caramel add-in guide:"));
}

fn replies_of(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<String> {
    replies(&drain(rx))
}

#[tokio::test]
async fn empty_input_invokes_no_strategy() {
    let remote = Arc::new(ScriptedStrategy::replying(ReplyMode::Server, "Grind finer for a sweeter brew."));
    let (session, mut rx) = session_with(vec![Arc::clone(&remote) as Arc<dyn ReplyStrategy>]);

    session.submit("  ").await;
    assert_eq!(remote.attempts(), 0);
    let events = drain(&mut rx);
    assert_eq!(replies(&events), vec![guide::EMPTY_REPLY]);
    assert_eq!(session.mode(), ReplyMode::Guided);
    assert_eq!(statuses(&events).last().unwrap(), "Brew guidance mode active.");
}

#[tokio::test]
async fn exhausted_chain_apologizes() {
    let remote = Arc::new(ScriptedStrategy::failing(ReplyMode::Server));
    let (session, mut rx) = session_with(vec![remote as Arc<dyn ReplyStrategy>]);

    session.submit("coffee grind size").await;
    let events = drain(&mut rx);
    assert!(events.contains(&SessionEvent::Apology(guide::APOLOGY_REPLY.into())));
    assert_eq!(statuses(&events).last().unwrap(), FAILURE_STATUS);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn panicking_strategy_apologizes_and_clears_busy() {
    let (session, mut rx) = session_with(vec![Arc::new(Exploding)]);

    assert_eq!(session.submit("coffee grind size").await, Submission::Resolved { answered: 1 });
    assert!(!session.is_busy());
    assert!(drain(&mut rx).contains(&SessionEvent::Apology(guide::APOLOGY_REPLY.into())));

    // The session stays usable.
    session.submit("   ").await;
    assert_eq!(replies_of(&mut rx), vec![guide::EMPTY_REPLY]);
}

#[tokio::test(start_paused = true)]
async fn reset_during_reply_keeps_initial_state() {
    let slow = SlowEcho { delay: Duration::from_secs(1), mode: ReplyMode::Server };
    let (session, mut rx) = session_with(vec![Arc::new(slow)]);

    let pending = tokio::spawn(session.submit("matcha latte"));
    assert_eq!(rx.recv().await, Some(SessionEvent::Status(THINKING_STATUS.into())));
    session.reset();

    assert_eq!(pending.await.unwrap(), Submission::Resolved { answered: 1 });
    assert_eq!(session.brew_base(), BrewBase::None);
    assert_eq!(session.mode(), ReplyMode::RuleBased);
    assert!(!session.is_busy());
    assert_eq!(replies_of(&mut rx), vec!["echo: matcha latte"]);

    session.submit("matcha latte").await;
    assert_eq!(session.brew_base(), BrewBase::Matcha);
    assert_eq!(session.mode(), ReplyMode::Server);
}

#[test]
fn panel_toggles() {
    let (session, _rx) = session_with(Vec::new());
    assert!(!session.is_open());
    assert!(session.toggle_open());
    session.set_open(false);
    assert!(!session.is_open());
    assert_eq!(session.snapshot().mode, ReplyMode::RuleBased);
}

#[tokio::test]
async fn reset_restores_initial_state() {
    let (session, _rx) = session_with(vec![Arc::new(RuleBasedStrategy)]);
    session.set_open(true);
    session.submit("hello").await;
    session.submit("espresso ratio").await;
    assert_eq!(session.mode(), ReplyMode::RuleBased);
    assert_eq!(session.brew_base(), BrewBase::Espresso);

    session.submit("hi").await;
    assert_eq!(session.mode(), ReplyMode::Guided);

    session.reset();
    assert_eq!(session.snapshot(), ConversationState::default());
}
