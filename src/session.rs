//! Conversation session: the single owner of chat state.
//!
//! DESIGN
//! ======
//! One [`Session`] per conversation. Submissions are serialized: while a
//! reply is being resolved, further messages are queued and answered in
//! order by the same drain loop. Admission happens when `submit` is called,
//! not when its future is first polled, so spawned submissions keep call
//! order. State lives behind a `std::sync::Mutex` that is never held across
//! an `.await`.
//!
//! `reset()` bumps a reset counter. A reply that was already running still
//! reaches the UI but does not write its topic or mode back over the reset.
//!
//! Progress and replies are pushed to the UI as [`SessionEvent`]s over an
//! unbounded channel. A failed or panicking resolution produces an apology
//! and the busy flag is always cleared.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::classify::BrewBase;
use crate::error::ErrorCode;
use crate::guide;
use crate::resolver::Resolver;
use crate::strategy::ReplyMode;

pub const THINKING_STATUS: &str = "Thinking...";
pub const LOADING_MODEL_STATUS: &str = "Loading on-device assistant...";
pub const FAILURE_STATUS: &str = "Temporary issue. Try again.";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Transient status line.
    Status(String),
    /// An answer to a user message.
    Reply { text: String, mode: ReplyMode },
    /// Resolution failed; `text` is the apology shown instead.
    Apology(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The message was answered, along with `answered - 1` queued ones.
    Resolved { answered: usize },
    /// Another reply was in flight; the message waits at `depth`.
    Queued { depth: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    pub open: bool,
    pub busy: bool,
    pub queue: VecDeque<String>,
    pub brew_base: BrewBase,
    pub mode: ReplyMode,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            open: false,
            busy: false,
            queue: VecDeque::new(),
            brew_base: BrewBase::None,
            mode: ReplyMode::RuleBased,
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

pub struct Session {
    resolver: Resolver,
    state: Mutex<ConversationState>,
    /// Bumped by `reset`; only changed while `state` is locked.
    resets: AtomicU64,
    events: mpsc::UnboundedSender<SessionEvent>,
}

enum Admission {
    Answer(String),
    Queued(usize),
}

impl Session {
    /// Shared so that submissions can be spawned as independent tasks.
    #[must_use]
    pub fn new(resolver: Resolver) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Self {
            resolver,
            state: Mutex::new(ConversationState::default()),
            resets: AtomicU64::new(0),
            events,
        };
        (Arc::new(session), rx)
    }

    fn lock(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn snapshot(&self) -> ConversationState {
        self.lock().clone()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn set_open(&self, open: bool) {
        self.lock().open = open;
    }

    /// Flip the panel and return the new state.
    pub fn toggle_open(&self) -> bool {
        let mut state = self.lock();
        state.open = !state.open;
        state.open
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    #[must_use]
    pub fn mode(&self) -> ReplyMode {
        self.lock().mode
    }

    #[must_use]
    pub fn brew_base(&self) -> BrewBase {
        self.lock().brew_base
    }

    /// Restore the initial state. An in-flight reply keeps its busy flag and
    /// finishes, but its topic and mode are discarded.
    pub fn reset(&self) {
        let mut state = self.lock();
        let busy = state.busy;
        *state = ConversationState { busy, ..ConversationState::default() };
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Submit a user message.
    ///
    /// The message is admitted before this returns: either it is queued
    /// behind the reply in flight (the future then resolves to
    /// [`Submission::Queued`] at once) or this submission takes the busy flag
    /// and its future answers the message and drains the queue in arrival
    /// order. Dropping that future clears the busy flag.
    pub fn submit(self: &Arc<Self>, message: impl Into<String>) -> BoxFuture<'static, Submission> {
        let first = match self.admit(message.into()) {
            Admission::Answer(first) => first,
            Admission::Queued(depth) => return Box::pin(future::ready(Submission::Queued { depth })),
        };

        let mut guard = BusyGuard { session: Arc::clone(self), armed: true };
        Box::pin(async move {
            let session = Arc::clone(&guard.session);
            let mut answered = 0;
            let mut next = Some(first);
            while let Some(message) = next {
                session.answer(&message).await;
                answered += 1;
                next = session.next_queued();
            }
            guard.armed = false;
            Submission::Resolved { answered }
        })
    }

    fn admit(&self, message: String) -> Admission {
        let mut state = self.lock();
        if state.busy {
            state.queue.push_back(message);
            let depth = state.queue.len();
            drop(state);
            self.emit(SessionEvent::Status(format!("Processing current reply. Queued: {depth}")));
            return Admission::Queued(depth);
        }
        state.busy = true;
        if state.queue.is_empty() {
            Admission::Answer(message)
        } else {
            state.queue.push_back(message);
            Admission::Answer(state.queue.pop_front().unwrap_or_default())
        }
    }

    /// Pop the next non-blank queued message. When the queue is drained the
    /// busy flag is cleared under the same lock, so no submission is lost.
    fn next_queued(&self) -> Option<String> {
        let mut state = self.lock();
        while let Some(message) = state.queue.pop_front() {
            if !message.trim().is_empty() {
                return Some(message);
            }
        }
        state.busy = false;
        None
    }

    async fn answer(&self, message: &str) {
        self.emit(SessionEvent::Status(THINKING_STATUS.to_string()));
        let (mut brew_base, epoch) = {
            let state = self.lock();
            (state.brew_base, self.resets.load(Ordering::Relaxed))
        };
        let progress = |mode: ReplyMode| {
            if mode == ReplyMode::OnDeviceModel {
                self.emit(SessionEvent::Status(LOADING_MODEL_STATUS.to_string()));
            }
        };

        let outcome = AssertUnwindSafe(self.resolver.resolve_with_progress(message, &mut brew_base, &progress))
            .catch_unwind()
            .await;

        {
            let mut state = self.lock();
            if self.resets.load(Ordering::Relaxed) == epoch {
                state.brew_base = brew_base;
                if let Ok(Ok(reply)) = &outcome {
                    state.mode = reply.mode;
                }
            } else {
                debug!("session: reset during reply, topic not kept");
            }
        }

        match outcome {
            Ok(Ok(reply)) => {
                debug!(mode = reply.mode.as_str(), "session: reply ready");
                let status = reply.mode.status_text().to_string();
                self.emit(SessionEvent::Reply { text: reply.text, mode: reply.mode });
                self.emit(SessionEvent::Status(status));
            }
            Ok(Err(e)) => {
                warn!(code = e.error_code(), error = %e, "session: resolution failed");
                self.apologize();
            }
            Err(_) => {
                warn!("session: resolution panicked");
                self.apologize();
            }
        }
    }

    fn apologize(&self) {
        self.emit(SessionEvent::Apology(guide::APOLOGY_REPLY.to_string()));
        self.emit(SessionEvent::Status(FAILURE_STATUS.to_string()));
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("session: event receiver dropped");
        }
    }
}

/// Clears the busy flag if a submission is dropped, cancelled or unwinds
/// before its drain loop finishes.
struct BusyGuard {
    session: Arc<Session>,
    armed: bool,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if self.armed {
            self.session.lock().busy = false;
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
