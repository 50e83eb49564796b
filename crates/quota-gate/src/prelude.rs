//! Convenience re-exports for common `quota-gate` types.
//!
//! Meant to be glob-imported by programs that run flows:
//!
//! ```ignore
//! use quota_gate::prelude::*;
//! ```
//!
//! This pulls in request construction, the HTTP client and config, the
//! orchestrator with its observers, the built-in gates, and the report
//! types. Wire-level helpers and prompt view models are left out; import
//! those from their modules directly when needed.

// ── Requests and results ────────────────────────────────────────────
pub use crate::request::{
    CacheChoice, OperationKind, OperationRequest, RefreshParams, SearchParams, SearchType,
    Step1Params,
};
pub use crate::result::OperationResult;
pub use crate::{CacheInfo, Estimate, GateError, ProbeOutcome, Severity};

// ── Network ─────────────────────────────────────────────────────────
pub use crate::api::{HttpApi, QuotaApi};
pub use crate::config::GateConfig;

// ── Flows ───────────────────────────────────────────────────────────
pub use crate::flow::{
    CancelReason, CompositeObserver, FlowEnd, FlowEvent, FlowHandle, FlowObserver, FlowOutcome,
    FnObserver, LoggingObserver, NoopObserver, Orchestrator,
};

// ── Gates ───────────────────────────────────────────────────────────
pub use crate::gate::{
    CacheDecision, ConfirmationGate, Decision, FnGate, GateAnswer, GateSlot, SlotGate,
    TerminalGate, fixed_gate,
};

// ── Reporting ───────────────────────────────────────────────────────
pub use crate::report::{ReconciliationReport, Reconciler};
pub use crate::tracking::{AccuracyAssessment, Grade, TrackingRecord};
