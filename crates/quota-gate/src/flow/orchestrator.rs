//! The orchestrator: drives one [`OperationRequest`] through probe,
//! gates, execution and reconciliation.
//!
//! Every step goes through [`transition`], so the order of network calls
//! is exactly the order the state machine allows: a costed call is only
//! issued from `Executing`, which is only reachable through `Proceed`.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::events::{CancelReason, FlowEvent, FlowId, FlowObserver, NoopObserver};
use super::state::{FlowKind, FlowState, FlowStep, transition};
use crate::api::QuotaApi;
use crate::cache::ProbeOutcome;
use crate::error::GateError;
use crate::estimate::Estimate;
use crate::gate::{CacheDecision, ConfirmationGate, Decision};
use crate::report::Reconciler;
use crate::request::{CacheChoice, OperationRequest};
use crate::result::OperationResult;

/// How a flow ended, when it did not fail.
#[derive(Debug)]
pub enum FlowOutcome {
    Completed(OperationResult),
    Cancelled(CancelReason),
}

impl FlowOutcome {
    pub fn result(&self) -> Option<&OperationResult> {
        match self {
            FlowOutcome::Completed(result) => Some(result),
            FlowOutcome::Cancelled(_) => None,
        }
    }
}

// ── Orchestrator ──────────────────────────────────────────────────

/// Composes the API, a gate and the reconciler into operation flows.
///
/// ```ignore
/// let api = HttpApi::new(&GateConfig::from_env()?)?;
/// let orchestrator = Orchestrator::new(api, TerminalGate::stdio())
///     .with_observer(LoggingObserver);
///
/// match orchestrator.run(OperationRequest::refresh(params)).await? {
///     FlowOutcome::Completed(result) => println!("{}", result.payload),
///     FlowOutcome::Cancelled(reason) => println!("{reason}"),
/// }
/// ```
pub struct Orchestrator {
    api: Arc<dyn QuotaApi>,
    gate: Arc<dyn ConfirmationGate>,
    reporter: Arc<Reconciler>,
    observer: Arc<dyn FlowObserver>,
}

impl Orchestrator {
    pub fn new(api: impl QuotaApi + 'static, gate: impl ConfirmationGate + 'static) -> Self {
        Self {
            api: Arc::new(api),
            gate: Arc::new(gate),
            reporter: Arc::new(Reconciler::new()),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Share a reconciler with other orchestrators or the caller.
    pub fn with_reporter(mut self, reporter: Arc<Reconciler>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_observer(mut self, observer: impl FlowObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn reporter(&self) -> &Arc<Reconciler> {
        &self.reporter
    }

    /// Run one flow to completion.
    ///
    /// Cancellation at a gate is `Ok(FlowOutcome::Cancelled)`. Errors from
    /// the network path are returned unmodified.
    pub async fn run(&self, request: OperationRequest) -> Result<FlowOutcome, GateError> {
        self.run_flow(FlowId::next(), request).await
    }

    async fn run_flow(
        &self,
        id: FlowId,
        request: OperationRequest,
    ) -> Result<FlowOutcome, GateError> {
        let mut run = FlowRun {
            id,
            kind: FlowKind::from(request.kind()),
            state: FlowState::Idle,
            observer: self.observer.as_ref(),
        };
        run.emit(FlowEvent::Started {
            flow: id,
            kind: run.kind,
        });

        match self.drive(&mut run, request).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(run.fail(e)),
        }
    }

    async fn drive(
        &self,
        run: &mut FlowRun<'_>,
        request: OperationRequest,
    ) -> Result<FlowOutcome, GateError> {
        request.validate()?;
        run.advance(FlowStep::Start)?;

        let mut request = request;
        if run.kind.probes() {
            match self.api.probe(&request).await {
                ProbeOutcome::Ready(result) => {
                    run.advance(FlowStep::ProbeReady)?;
                    run.advance(FlowStep::Delivered)?;
                    return Ok(run.complete(result));
                }
                ProbeOutcome::ConfirmationRequired(estimate) => {
                    run.advance(FlowStep::ProbeNeedsConfirmation)?;
                    return self.confirm_and_execute(run, &request, estimate).await;
                }
                ProbeOutcome::Failed(e) => return Err(e),
                ProbeOutcome::CacheAvailable(info) => {
                    run.advance(FlowStep::ProbeCache)?;
                    run.emit(FlowEvent::CacheOffered {
                        flow: run.id,
                        info: &info,
                    });
                    let decision: CacheDecision = match self.gate.choose_cache(&info).await {
                        None => return run.cancel(CancelReason::Superseded),
                        Some(decision) => decision,
                    };
                    let Some(choice) = decision.choice() else {
                        return run.cancel(CancelReason::User);
                    };
                    request = request.with_cache_choice(choice);
                    match choice {
                        CacheChoice::UseCache => {
                            run.advance(FlowStep::UseCache)?;
                            let cached = self.api.use_cache(&request).await?;
                            run.advance(FlowStep::CacheLoaded)?;
                            run.advance(FlowStep::Delivered)?;
                            return Ok(run.complete(cached));
                        }
                        CacheChoice::Refresh => run.advance(FlowStep::RefreshCache)?,
                    }
                }
            }
        }

        let estimate = self.api.estimate(&request).await?;
        run.advance(FlowStep::Estimated)?;
        self.confirm_and_execute(run, &request, estimate).await
    }

    async fn confirm_and_execute(
        &self,
        run: &mut FlowRun<'_>,
        request: &OperationRequest,
        estimate: Estimate,
    ) -> Result<FlowOutcome, GateError> {
        run.emit(FlowEvent::Estimated {
            flow: run.id,
            estimate: &estimate,
        });
        match self.gate.confirm(&estimate).await {
            None => return run.cancel(CancelReason::Superseded),
            Some(Decision::Cancel) => return run.cancel(CancelReason::User),
            Some(Decision::Proceed) => run.advance(FlowStep::Proceed)?,
        }

        let result = self.api.execute(&request.with_confirmed()).await?;
        run.advance(FlowStep::Executed {
            tracked: result.tracking_record.is_some(),
        })?;

        if let Some(record) = &result.tracking_record {
            let report = self.reporter.report(record);
            run.emit(FlowEvent::Reported {
                flow: run.id,
                report: &report,
            });
            run.advance(FlowStep::Reported)?;
        }
        Ok(run.complete(result))
    }

    /// Run a flow on the tokio runtime and hand its result to one of two
    /// continuations.
    ///
    /// Exactly one continuation runs for a completed or failed flow. A
    /// cancelled or aborted flow runs neither.
    pub fn spawn<S, E>(
        self: &Arc<Self>,
        request: OperationRequest,
        on_success: S,
        on_error: E,
    ) -> FlowHandle
    where
        S: FnOnce(OperationResult) + Send + 'static,
        E: FnOnce(GateError) + Send + 'static,
    {
        let (abort_tx, abort_rx) = oneshot::channel::<()>();
        let this = Arc::clone(self);
        let id = FlowId::next();

        let task = tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                Ok(()) = abort_rx => None,
                outcome = this.run_flow(id, request) => Some(outcome),
            };
            match outcome {
                None => {
                    this.observer.on_event(&FlowEvent::Aborted { flow: id });
                    FlowEnd::Aborted
                }
                Some(Ok(FlowOutcome::Completed(result))) => {
                    on_success(result);
                    FlowEnd::Succeeded
                }
                Some(Ok(FlowOutcome::Cancelled(reason))) => FlowEnd::Cancelled(reason),
                Some(Err(e)) => {
                    on_error(e);
                    FlowEnd::Failed
                }
            }
        });

        FlowHandle {
            id,
            abort: Mutex::new(Some(abort_tx)),
            task,
        }
    }
}

// ── FlowRun ───────────────────────────────────────────────────────

/// Current state of one running flow plus its event sink.
struct FlowRun<'a> {
    id: FlowId,
    kind: FlowKind,
    state: FlowState,
    observer: &'a dyn FlowObserver,
}

impl FlowRun<'_> {
    fn emit(&self, event: FlowEvent<'_>) {
        self.observer.on_event(&event);
    }

    fn advance(&mut self, step: FlowStep) -> Result<(), GateError> {
        let next = transition(self.kind, self.state, step)?;
        self.emit(FlowEvent::Transition {
            flow: self.id,
            from: self.state,
            to: next,
            step,
        });
        self.state = next;
        Ok(())
    }

    fn complete(&self, result: OperationResult) -> FlowOutcome {
        self.emit(FlowEvent::Completed {
            flow: self.id,
            result: &result,
        });
        FlowOutcome::Completed(result)
    }

    fn cancel(&mut self, reason: CancelReason) -> Result<FlowOutcome, GateError> {
        self.advance(FlowStep::Cancel)?;
        self.emit(FlowEvent::Cancelled {
            flow: self.id,
            reason,
        });
        Ok(FlowOutcome::Cancelled(reason))
    }

    /// Record `error` and move to `Failed` when the current state allows it.
    /// Validation errors are raised from `Idle` and leave the state alone.
    fn fail(&mut self, error: GateError) -> GateError {
        match transition(self.kind, self.state, FlowStep::Fail) {
            Ok(next) => {
                self.emit(FlowEvent::Transition {
                    flow: self.id,
                    from: self.state,
                    to: next,
                    step: FlowStep::Fail,
                });
                self.state = next;
            }
            Err(_) => debug!("[{}] failed from {:?}", self.id, self.state),
        }
        self.emit(FlowEvent::Failed {
            flow: self.id,
            error: &error,
        });
        error
    }
}

// ── FlowHandle ────────────────────────────────────────────────────

/// How a spawned flow ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowEnd {
    /// `on_success` ran.
    Succeeded,
    /// `on_error` ran.
    Failed,
    Cancelled(CancelReason),
    /// Stopped through [`FlowHandle::abort`]; no continuation ran.
    Aborted,
}

/// Handle to a flow started with [`Orchestrator::spawn`].
pub struct FlowHandle {
    id: FlowId,
    abort: Mutex<Option<oneshot::Sender<()>>>,
    task: JoinHandle<FlowEnd>,
}

impl FlowHandle {
    pub fn id(&self) -> FlowId {
        self.id
    }

    /// Stop the flow. A request already in flight completes on the server
    /// but its response is never observed. Calling this more than once, or
    /// after the flow ended, does nothing.
    pub fn abort(&self) {
        let sender = self
            .abort
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(tx) = sender {
            let _ = tx.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> FlowEnd {
        match self.task.await {
            Ok(end) => end,
            Err(e) => {
                warn!("[{}] flow task ended abnormally: {e}", self.id);
                FlowEnd::Aborted
            }
        }
    }
}
