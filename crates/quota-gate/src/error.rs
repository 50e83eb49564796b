//! Error taxonomy for the confirmation workflow.
//!
//! Every failure on the async network path (estimate, probe, execute) is
//! returned to the flow's caller unmodified. Nothing in this crate retries;
//! a caller that wants a retry starts a new flow.
//!
//! A gate `Cancel` is *not* an error. Flows that end in a cancellation
//! return [`FlowOutcome::Cancelled`](crate::flow::FlowOutcome::Cancelled).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    /// The request is malformed. Raised before any network call.
    #[error("invalid request: {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The request could not be sent or the response body could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a well-formed payload carrying `success=false`.
    #[error("server rejected request: {message}")]
    ServerRejection {
        message: String,
        /// Raw response body, kept for rendering.
        raw: serde_json::Value,
    },

    /// The server answered with a payload the client could not decode.
    #[error("malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },

    /// A tracking record violated one of its invariants.
    #[error("invalid tracking record: {0}")]
    InvalidTrackingRecord(String),

    /// Export was requested before any tracking record was reported.
    #[error("no tracking record to export")]
    EmptyExport,

    /// The orchestrator attempted a step its state machine forbids.
    #[error("internal: {0}")]
    InvalidTransition(#[from] crate::flow::InvalidTransition),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl GateError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        GateError::Validation {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn malformed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        GateError::MalformedResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from the async network path.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            GateError::Transport(_)
                | GateError::ServerRejection { .. }
                | GateError::MalformedResponse { .. }
                | GateError::InvalidTrackingRecord(_)
        )
    }

    /// Raw server payload for rejections, if any.
    pub fn raw_response(&self) -> Option<&serde_json::Value> {
        match self {
            GateError::ServerRejection { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
