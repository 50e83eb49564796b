//! The flow state machine as data: a tag-only [`FlowState`], the
//! [`FlowStep`]s that move it, and a pure [`transition`] function.
//!
//! ```text
//!          search                     step1 / refresh
//! Idle ──Start──▶ Probing            Idle ──Start──▶ Estimating
//!
//! Probing ──ProbeReady──────────▶ Ready ──Delivered──▶ Idle
//! Probing ──ProbeCache──────────▶ CacheDeciding
//! Probing ──ProbeNeedsConfirm───▶ Confirming
//! CacheDeciding ──UseCache──────▶ LoadingCache ──CacheLoaded──▶ Ready
//! CacheDeciding ──RefreshCache──▶ Estimating
//! Estimating ──Estimated────────▶ Confirming
//! Confirming ──Proceed──────────▶ Executing
//! Executing ──Executed{tracked}─▶ Reporting ──Reported──▶ Idle
//! Executing ──Executed{!tracked}▶ Idle
//! CacheDeciding | Confirming ──Cancel──▶ Cancelled
//! any active state ──Fail──▶ Failed
//! ```

use serde::Serialize;
use thiserror::Error;

use crate::request::OperationKind;

/// Which flow is running. Only search probes for a cache.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Search,
    Step1,
    Refresh,
}

impl FlowKind {
    pub fn probes(self) -> bool {
        matches!(self, FlowKind::Search)
    }
}

impl From<OperationKind> for FlowKind {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Search => FlowKind::Search,
            OperationKind::Step1Search => FlowKind::Step1,
            OperationKind::Refresh => FlowKind::Refresh,
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Idle,
    Probing,
    /// A result is available without a costed call.
    Ready,
    CacheDeciding,
    LoadingCache,
    Estimating,
    Confirming,
    Executing,
    Reporting,
    Cancelled,
    Failed,
}

impl FlowState {
    /// States from which no further step is accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowState::Cancelled | FlowState::Failed)
    }

    /// States waiting on a user decision.
    pub fn is_gate(self) -> bool {
        matches!(self, FlowState::CacheDeciding | FlowState::Confirming)
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    Start,
    ProbeReady,
    ProbeCache,
    ProbeNeedsConfirmation,
    UseCache,
    RefreshCache,
    CacheLoaded,
    Estimated,
    Proceed,
    Cancel,
    Executed { tracked: bool },
    Reported,
    Delivered,
    Fail,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{kind:?} flow cannot take {step:?} from {state:?}")]
pub struct InvalidTransition {
    pub kind: FlowKind,
    pub state: FlowState,
    pub step: FlowStep,
}

/// The next state of a `kind` flow in `state` after `step`.
pub fn transition(
    kind: FlowKind,
    state: FlowState,
    step: FlowStep,
) -> Result<FlowState, InvalidTransition> {
    use FlowState as S;
    use FlowStep as E;

    let next = match (state, step) {
        (S::Idle, E::Start) if kind.probes() => S::Probing,
        (S::Idle, E::Start) => S::Estimating,

        (S::Probing, E::ProbeReady) => S::Ready,
        (S::Probing, E::ProbeCache) => S::CacheDeciding,
        (S::Probing, E::ProbeNeedsConfirmation) => S::Confirming,

        (S::CacheDeciding, E::UseCache) => S::LoadingCache,
        (S::CacheDeciding, E::RefreshCache) => S::Estimating,
        (S::LoadingCache, E::CacheLoaded) => S::Ready,
        (S::Ready, E::Delivered) => S::Idle,

        (S::Estimating, E::Estimated) => S::Confirming,
        (S::Confirming, E::Proceed) => S::Executing,
        (S::Executing, E::Executed { tracked: true }) => S::Reporting,
        (S::Executing, E::Executed { tracked: false }) => S::Idle,
        (S::Reporting, E::Reported) => S::Idle,

        (s, E::Cancel) if s.is_gate() => S::Cancelled,
        (s, E::Fail) if !s.is_terminal() && s != S::Idle => S::Failed,

        _ => return Err(InvalidTransition { kind, state, step }),
    };
    Ok(next)
}
