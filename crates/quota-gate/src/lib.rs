//! Confirmation-gated client for rate-limited, cost-bearing data APIs.
//!
//! `quota-gate` puts every expensive remote call behind a fixed protocol:
//! the caller sees a cost and time estimate, may be offered a cached
//! alternative, confirms explicitly, and afterwards receives a report that
//! reconciles the estimate with what the server actually did. The core
//! abstraction is the [`Orchestrator`](flow::Orchestrator), which runs one
//! request through that protocol as a small state machine.
//!
//! # Getting started
//!
//! ```ignore
//! use quota_gate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GateError> {
//!     let config = GateConfig::from_env()?;
//!     let orchestrator = Orchestrator::new(HttpApi::new(&config)?, TerminalGate::stdio())
//!         .with_observer(LoggingObserver);
//!
//!     let request = OperationRequest::refresh(RefreshParams::new("Raemian One", "11680"));
//!     match orchestrator.run(request).await? {
//!         FlowOutcome::Completed(result) => println!("{}", result.payload),
//!         FlowOutcome::Cancelled(reason) => eprintln!("{reason}"),
//!     }
//!     if let Some(report) = orchestrator.reporter().current_report() {
//!         println!("{}", report.render());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Describe an operation:** [`OperationRequest`](request::OperationRequest)
//!   with [`SearchParams`](request::SearchParams),
//!   [`Step1Params`](request::Step1Params) or
//!   [`RefreshParams`](request::RefreshParams).
//!
//! - **Talk to the server:** the [`QuotaApi`](api::QuotaApi) trait and its
//!   `reqwest` implementation [`HttpApi`](api::HttpApi). Configure it with
//!   [`GateConfig`](config::GateConfig).
//!
//! - **Ask the user:** implement [`ConfirmationGate`](gate::ConfirmationGate),
//!   or use [`TerminalGate`](gate::TerminalGate), [`FnGate`](gate::FnGate),
//!   or [`SlotGate`](gate::SlotGate) for a shared single-prompt display that a
//!   web frontend can answer.
//!
//! - **Observe flows:** implement [`FlowObserver`](flow::FlowObserver) or use
//!   [`LoggingObserver`](flow::LoggingObserver).
//!
//! - **Compare estimate and outcome:** [`Reconciler`](report::Reconciler) and
//!   [`ReconciliationReport`](report::ReconciliationReport), built on the
//!   accuracy figures in [`tracking`].
//!
//! Nothing in this crate retries. A failed flow is reported to its caller
//! and a retry is a new flow.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod estimate;
pub mod flow;
pub mod gate;
pub mod prelude;
pub mod report;
pub mod request;
pub mod result;
pub mod tracking;

#[cfg(test)]
mod testing;

pub use api::{HttpApi, QuotaApi};
pub use cache::{CacheInfo, ProbeOutcome};
pub use config::GateConfig;
pub use error::GateError;
pub use estimate::{Estimate, OperationDetail, Quota, Severity};
pub use flow::{FlowOutcome, Orchestrator};
pub use request::{OperationKind, OperationRequest};
pub use result::OperationResult;
pub use tracking::TrackingRecord;
