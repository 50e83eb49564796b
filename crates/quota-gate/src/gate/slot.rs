//! The single "currently displayed gate" slot.
//!
//! Flows present prompts into a shared [`GateSlot`]; a frontend reads the
//! [`snapshot`](GateSlot::snapshot) and answers with
//! [`resolve`](GateSlot::resolve). Presenting a new prompt replaces the
//! previous one: the replaced flow's pending decision resolves to `None`
//! and a late answer carrying its [`GateId`] is ignored.
//!
//! ```text
//! flow A ──present──▶ ┌──────────┐ ◀──snapshot── frontend
//! flow B ──present──▶ │ GateSlot │ ◀──resolve─── frontend
//!                     └──────────┘
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

use super::prompt::{CachePrompt, ConfirmationPrompt, GatePrompt};
use super::{CacheDecision, ConfirmationGate, Decision, GateAnswer, GateFuture};
use crate::cache::CacheInfo;
use crate::estimate::Estimate;

/// Identity token for one presented prompt. Never reused within a slot.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct GateId(pub u64);

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gate#{}", self.0)
    }
}

/// Why an answer was not delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no gate is awaiting an answer")]
    NoActiveGate,
    #[error("{answered} is no longer displayed (current: {current})")]
    Stale { answered: GateId, current: GateId },
    #[error("{answer:?} is not a valid answer for {gate}")]
    InvalidAnswer { gate: GateId, answer: GateAnswer },
}

/// Read-only view of the displayed prompt.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct GateSnapshot {
    pub gate_id: GateId,
    pub prompt: GatePrompt,
    pub choices: Vec<GateAnswer>,
    pub text: String,
}

struct ActiveGate {
    id: GateId,
    prompt: GatePrompt,
    responder: oneshot::Sender<GateAnswer>,
}

struct SlotState {
    next_id: u64,
    active: Option<ActiveGate>,
}

/// Shared slot holding at most one displayed prompt.
pub struct GateSlot {
    state: Mutex<SlotState>,
    changed: watch::Sender<Option<GateId>>,
}

impl Default for GateSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl GateSlot {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(None);
        Self {
            state: Mutex::new(SlotState {
                next_id: 1,
                active: None,
            }),
            changed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Display `prompt`, replacing whatever was shown.
    ///
    /// The receiver yields the answer, or an error if this prompt is
    /// replaced or withdrawn first.
    pub fn present(&self, prompt: GatePrompt) -> (GateId, oneshot::Receiver<GateAnswer>) {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();
        let id = GateId(state.next_id);
        state.next_id += 1;
        let previous = state.active.replace(ActiveGate {
            id,
            prompt,
            responder: tx,
        });
        // Published under the lock so the watch never lags the slot.
        self.changed.send_replace(Some(id));
        drop(state);

        if let Some(prev) = previous {
            // Dropping the sender wakes the superseded flow with RecvError.
            debug!("{} superseded by {id}", prev.id);
        }
        debug!("{id} presented");
        (id, rx)
    }

    /// Deliver `answer` to the prompt identified by `id`.
    ///
    /// An answer for a prompt that is no longer displayed changes nothing.
    pub fn resolve(&self, id: GateId, answer: GateAnswer) -> Result<(), ResolveError> {
        let mut state = self.lock();
        let active = match state.active.as_ref() {
            None => return Err(ResolveError::NoActiveGate),
            Some(active) => active,
        };
        if active.id != id {
            let current = active.id;
            drop(state);
            warn!("ignoring answer {answer:?} for stale {id} (current: {current})");
            return Err(ResolveError::Stale {
                answered: id,
                current,
            });
        }
        if !active.prompt.accepts(answer) {
            return Err(ResolveError::InvalidAnswer { gate: id, answer });
        }
        let Some(active) = state.active.take() else {
            return Err(ResolveError::NoActiveGate);
        };
        self.changed.send_replace(None);
        drop(state);

        if active.responder.send(answer).is_err() {
            debug!("{id} answered after its flow stopped waiting");
        } else {
            debug!("{id} resolved: {answer:?}");
        }
        Ok(())
    }

    /// Remove the prompt `id` if it is still displayed.
    pub fn withdraw(&self, id: GateId) {
        let mut state = self.lock();
        if state.active.as_ref().is_some_and(|a| a.id == id) {
            state.active = None;
            self.changed.send_replace(None);
            drop(state);
            debug!("{id} withdrawn");
        }
    }

    pub fn snapshot(&self) -> Option<GateSnapshot> {
        let state = self.lock();
        state.active.as_ref().map(|a| GateSnapshot {
            gate_id: a.id,
            prompt: a.prompt.clone(),
            choices: a.prompt.choices().to_vec(),
            text: a.prompt.render(),
        })
    }

    pub fn active_id(&self) -> Option<GateId> {
        self.lock().active.as_ref().map(|a| a.id)
    }

    /// Watch the displayed gate id. `None` when the slot is empty.
    pub fn subscribe(&self) -> watch::Receiver<Option<GateId>> {
        self.changed.subscribe()
    }
}

// ── SlotGate ──────────────────────────────────────────────────────

/// A [`ConfirmationGate`] that routes prompts through a shared [`GateSlot`].
#[derive(Clone)]
pub struct SlotGate {
    slot: Arc<GateSlot>,
}

impl SlotGate {
    pub fn new(slot: Arc<GateSlot>) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> &Arc<GateSlot> {
        &self.slot
    }

    async fn ask(&self, prompt: GatePrompt) -> Option<GateAnswer> {
        let (id, rx) = self.slot.present(prompt);
        let guard = WithdrawOnDrop {
            slot: &self.slot,
            id,
        };
        let answer = rx.await.ok();
        drop(guard);
        answer
    }
}

/// Clears the slot if the waiting future is dropped mid-prompt.
struct WithdrawOnDrop<'a> {
    slot: &'a GateSlot,
    id: GateId,
}

impl Drop for WithdrawOnDrop<'_> {
    fn drop(&mut self) {
        self.slot.withdraw(self.id);
    }
}

impl ConfirmationGate for SlotGate {
    fn confirm<'a>(&'a self, estimate: &'a Estimate) -> GateFuture<'a, Decision> {
        Box::pin(async move {
            let prompt = GatePrompt::Confirm(ConfirmationPrompt::from_estimate(estimate));
            self.ask(prompt).await.and_then(GateAnswer::as_decision)
        })
    }

    fn choose_cache<'a>(&'a self, info: &'a CacheInfo) -> GateFuture<'a, CacheDecision> {
        Box::pin(async move {
            let prompt = GatePrompt::CacheChoice(CachePrompt::from_info(info));
            self.ask(prompt).await.and_then(GateAnswer::as_cache_decision)
        })
    }
}
