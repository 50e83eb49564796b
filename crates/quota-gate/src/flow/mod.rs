//! Operation flows.
//!
//! - [`state`]: the state machine as data and its pure transition function.
//! - [`events`]: [`FlowEvent`]s and the observers that consume them.
//! - [`orchestrator`]: [`Orchestrator`], which runs search, step1 and
//!   refresh flows over a [`QuotaApi`](crate::api::QuotaApi) and a
//!   [`ConfirmationGate`](crate::gate::ConfirmationGate).

pub mod events;
pub mod orchestrator;
pub mod state;

pub use events::{
    CancelReason, CompositeObserver, FlowEvent, FlowId, FlowObserver, FnObserver,
    LoggingObserver, NoopObserver,
};
pub use orchestrator::{FlowEnd, FlowHandle, FlowOutcome, Orchestrator};
pub use state::{FlowKind, FlowState, FlowStep, InvalidTransition, transition};
