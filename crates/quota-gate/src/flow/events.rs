//! Events and observers for running flows.
//!
//! The [`Orchestrator`](super::Orchestrator) reports every state change and
//! every intermediate artifact through [`FlowEvent`] variants. Callers
//! implement [`FlowObserver`] to render progress, collect metrics, or drive
//! a UI.
//!
//! # Choosing an observer
//!
//! | Observer | Use case |
//! |----------|----------|
//! | [`NoopObserver`] | Tests or fire-and-forget runs |
//! | [`LoggingObserver`] | Structured logging via `tracing` |
//! | [`FnObserver`] | Quick closures for simple callbacks |
//! | [`CompositeObserver`] | Compose multiple observers in order |

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use super::state::{FlowKind, FlowState, FlowStep};
use crate::cache::CacheInfo;
use crate::error::GateError;
use crate::estimate::Estimate;
use crate::report::ReconciliationReport;
use crate::result::OperationResult;

static NEXT_FLOW_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id for one flow run, used to correlate events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlowId(u64);

impl FlowId {
    pub(crate) fn next() -> Self {
        FlowId(NEXT_FLOW_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow#{}", self.0)
    }
}

/// Why a flow ended without a result or an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// The user answered cancel at a gate.
    User,
    /// Another flow's prompt replaced this flow's prompt.
    Superseded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CancelReason::User => "cancelled by user",
            CancelReason::Superseded => "prompt superseded",
        })
    }
}

// ── Events ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum FlowEvent<'a> {
    Started {
        flow: FlowId,
        kind: FlowKind,
    },
    Transition {
        flow: FlowId,
        from: FlowState,
        to: FlowState,
        step: FlowStep,
    },
    /// The probe offered a cached alternative.
    CacheOffered {
        flow: FlowId,
        info: &'a CacheInfo,
    },
    /// An estimate is about to be shown at the confirmation gate.
    Estimated {
        flow: FlowId,
        estimate: &'a Estimate,
    },
    /// A tracking record was reconciled against its estimate.
    Reported {
        flow: FlowId,
        report: &'a ReconciliationReport,
    },
    Completed {
        flow: FlowId,
        result: &'a OperationResult,
    },
    Cancelled {
        flow: FlowId,
        reason: CancelReason,
    },
    Failed {
        flow: FlowId,
        error: &'a GateError,
    },
    /// The flow was aborted through its handle.
    Aborted {
        flow: FlowId,
    },
}

/// Observes flow events. Must not block.
pub trait FlowObserver: Send + Sync {
    fn on_event(&self, event: &FlowEvent<'_>) {
        let _ = event;
    }
}

pub struct NoopObserver;
impl FlowObserver for NoopObserver {}

impl<T: FlowObserver + ?Sized> FlowObserver for std::sync::Arc<T> {
    fn on_event(&self, event: &FlowEvent<'_>) {
        (**self).on_event(event)
    }
}

/// An observer backed by a closure.
///
/// ```ignore
/// let observer = FnObserver::new(|event| {
///     if let FlowEvent::Reported { report, .. } = event {
///         println!("{}", report.render());
///     }
/// });
/// ```
pub struct FnObserver<F>(F)
where
    F: Fn(&FlowEvent<'_>) + Send + Sync;

impl<F> FnObserver<F>
where
    F: Fn(&FlowEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> FlowObserver for FnObserver<F>
where
    F: Fn(&FlowEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &FlowEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches each event to every inner observer in registration order.
pub struct CompositeObserver {
    observers: Vec<Box<dyn FlowObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub fn with(mut self, observer: impl FlowObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn with_if(self, condition: bool, observer: impl FlowObserver + 'static) -> Self {
        if condition { self.with(observer) } else { self }
    }
}

impl Default for CompositeObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowObserver for CompositeObserver {
    fn on_event(&self, event: &FlowEvent<'_>) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

/// Logs flow events via `tracing`.
pub struct LoggingObserver;

impl FlowObserver for LoggingObserver {
    fn on_event(&self, event: &FlowEvent<'_>) {
        match event {
            FlowEvent::Started { flow, kind } => {
                debug!("[{flow}] {kind:?} flow started");
            }
            FlowEvent::Transition {
                flow,
                from,
                to,
                step,
            } => {
                debug!("[{flow}] {from:?} --{step:?}--> {to:?}");
            }
            FlowEvent::CacheOffered { flow, info } => {
                info!(
                    "[{flow}] cache available for {}: {} records, {}h old",
                    info.region_label, info.record_count, info.age_hours
                );
            }
            FlowEvent::Estimated { flow, estimate } => {
                info!(
                    "[{flow}] estimate: {} calls, {}, quota {:.1}% ({})",
                    estimate.predicted_call_count,
                    estimate.predicted_duration.display,
                    estimate.quota.usage_percentage(),
                    estimate.quota.severity().label(),
                );
            }
            FlowEvent::Reported { flow, report } => {
                info!(
                    "[{flow}] {}: calls {} -> {}, accuracy {:.1}% ({})",
                    report.operation_id,
                    report.calls.estimated,
                    report.calls.actual,
                    report.assessment.overall_accuracy,
                    report.assessment.grade.label(),
                );
            }
            FlowEvent::Completed { flow, result } => {
                info!(
                    "[{flow}] completed{}",
                    if result.from_cache() { " (from cache)" } else { "" }
                );
            }
            FlowEvent::Cancelled { flow, reason } => {
                info!("[{flow}] {reason}");
            }
            FlowEvent::Failed { flow, error } => {
                warn!("[{flow}] failed: {error}");
            }
            FlowEvent::Aborted { flow } => {
                info!("[{flow}] aborted");
            }
        }
    }
}
