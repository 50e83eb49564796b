//! User decision points.
//!
//! A [`ConfirmationGate`] answers two questions for the orchestrator: may
//! this estimated, costed call proceed ([`confirm`](ConfirmationGate::confirm)),
//! and what to do with an available cache
//! ([`choose_cache`](ConfirmationGate::choose_cache)). Each call yields
//! exactly one decision and has no timeout.
//!
//! # Choosing a gate
//!
//! | Gate | Use case |
//! |------|----------|
//! | [`SlotGate`] | Shared single-slot display (web frontend, multiple flows) |
//! | [`TerminalGate`] | Interactive CLI prompts on stdin |
//! | [`FnGate`] | Closures; scripted decisions and `--auto-confirm` |
//! | Custom `impl ConfirmationGate` | Anything else |

pub mod prompt;
pub mod slot;
pub mod terminal;

pub use prompt::{CachePrompt, ConfirmationPrompt, DetailRow, GatePrompt};
pub use slot::{GateId, GateSlot, GateSnapshot, ResolveError, SlotGate};
pub use terminal::TerminalGate;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::cache::CacheInfo;
use crate::estimate::Estimate;
use crate::request::CacheChoice;

/// Answer to a confirmation prompt.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Proceed,
    Cancel,
}

/// Answer to a cache-choice prompt.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheDecision {
    UseCache,
    Refresh,
    Cancel,
}

impl CacheDecision {
    /// The request annotation for a non-cancel decision.
    pub fn choice(self) -> Option<CacheChoice> {
        match self {
            CacheDecision::UseCache => Some(CacheChoice::UseCache),
            CacheDecision::Refresh => Some(CacheChoice::Refresh),
            CacheDecision::Cancel => None,
        }
    }
}

/// Any answer a frontend can submit. Which ones are valid depends on the
/// prompt; see [`GatePrompt::choices`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateAnswer {
    Proceed,
    UseCache,
    Refresh,
    Cancel,
}

impl GateAnswer {
    pub fn as_decision(self) -> Option<Decision> {
        match self {
            GateAnswer::Proceed => Some(Decision::Proceed),
            GateAnswer::Cancel => Some(Decision::Cancel),
            _ => None,
        }
    }

    pub fn as_cache_decision(self) -> Option<CacheDecision> {
        match self {
            GateAnswer::UseCache => Some(CacheDecision::UseCache),
            GateAnswer::Refresh => Some(CacheDecision::Refresh),
            GateAnswer::Cancel => Some(CacheDecision::Cancel),
            GateAnswer::Proceed => None,
        }
    }
}

impl std::str::FromStr for GateAnswer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proceed" => Ok(GateAnswer::Proceed),
            "use_cache" => Ok(GateAnswer::UseCache),
            "refresh" => Ok(GateAnswer::Refresh),
            "cancel" => Ok(GateAnswer::Cancel),
            other => Err(format!("unknown answer '{other}'")),
        }
    }
}

/// Boxed future returned by gate methods.
///
/// Resolves to `None` when the prompt was withdrawn before an answer
/// arrived, e.g. superseded by another flow's prompt.
pub type GateFuture<'a, T> = Pin<Box<dyn Future<Output = Option<T>> + Send + 'a>>;

/// A source of user decisions.
pub trait ConfirmationGate: Send + Sync {
    /// Proceed with or cancel the costed call described by `estimate`.
    fn confirm<'a>(&'a self, estimate: &'a Estimate) -> GateFuture<'a, Decision>;

    /// Use the cache, refresh it, or cancel.
    fn choose_cache<'a>(&'a self, info: &'a CacheInfo) -> GateFuture<'a, CacheDecision>;
}

impl<T: ConfirmationGate + ?Sized> ConfirmationGate for std::sync::Arc<T> {
    fn confirm<'a>(&'a self, estimate: &'a Estimate) -> GateFuture<'a, Decision> {
        (**self).confirm(estimate)
    }

    fn choose_cache<'a>(&'a self, info: &'a CacheInfo) -> GateFuture<'a, CacheDecision> {
        (**self).choose_cache(info)
    }
}

// ── FnGate ────────────────────────────────────────────────────────

/// A gate backed by two closures. Decisions are immediate.
///
/// ```ignore
/// let gate = FnGate::new(
///     |est| if est.quota.severity() == Severity::Critical { Decision::Cancel } else { Decision::Proceed },
///     |_| CacheDecision::UseCache,
/// );
/// ```
pub struct FnGate<C, K>
where
    C: Fn(&Estimate) -> Decision + Send + Sync,
    K: Fn(&CacheInfo) -> CacheDecision + Send + Sync,
{
    confirm: C,
    cache: K,
}

impl<C, K> FnGate<C, K>
where
    C: Fn(&Estimate) -> Decision + Send + Sync,
    K: Fn(&CacheInfo) -> CacheDecision + Send + Sync,
{
    pub fn new(confirm: C, cache: K) -> Self {
        Self { confirm, cache }
    }
}

/// A gate that always gives the same answers.
pub fn fixed_gate(
    decision: Decision,
    cache: CacheDecision,
) -> FnGate<
    impl Fn(&Estimate) -> Decision + Send + Sync,
    impl Fn(&CacheInfo) -> CacheDecision + Send + Sync,
> {
    FnGate::new(move |_: &Estimate| decision, move |_: &CacheInfo| cache)
}

impl<C, K> ConfirmationGate for FnGate<C, K>
where
    C: Fn(&Estimate) -> Decision + Send + Sync,
    K: Fn(&CacheInfo) -> CacheDecision + Send + Sync,
{
    fn confirm<'a>(&'a self, estimate: &'a Estimate) -> GateFuture<'a, Decision> {
        let decision = (self.confirm)(estimate);
        Box::pin(async move { Some(decision) })
    }

    fn choose_cache<'a>(&'a self, info: &'a CacheInfo) -> GateFuture<'a, CacheDecision> {
        let decision = (self.cache)(info);
        Box::pin(async move { Some(decision) })
    }
}
