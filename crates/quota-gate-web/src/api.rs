//! REST endpoint handlers.
//!
//! `GET /api/gate` reads the prompt on display; `POST /api/answer` answers
//! it. Both complement the WebSocket channel for clients that prefer
//! request/response semantics.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quota_gate::gate::{GateAnswer, GateId, GateSlot, ResolveError};
use serde::Deserialize;
use tracing::debug;

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub slot: Arc<GateSlot>,
}

/// GET /api/gate: the prompt on display.
///
/// Returns the [`GateSnapshot`](quota_gate::gate::GateSnapshot) as JSON, or
/// 204 when no prompt is waiting.
pub async fn get_gate(State(app): State<AppState>) -> Response {
    match app.slot.snapshot() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Request body for POST /api/answer.
#[derive(Deserialize, Debug, PartialEq)]
pub struct AnswerRequest {
    pub gate_id: GateId,
    pub answer: GateAnswer,
}

/// HTTP status for a rejected answer.
pub(crate) fn rejection_status(err: &ResolveError) -> StatusCode {
    match err {
        ResolveError::NoActiveGate => StatusCode::NOT_FOUND,
        ResolveError::Stale { .. } => StatusCode::GONE,
        ResolveError::InvalidAnswer { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

/// POST /api/answer: answer the prompt identified by `gate_id`.
///
/// Returns 204 on success, 404 if nothing is displayed, 410 if `gate_id`
/// was replaced by a newer prompt, and 422 if the answer does not fit the
/// prompt.
pub async fn post_answer(
    State(app): State<AppState>,
    Json(body): Json<AnswerRequest>,
) -> Response {
    match app.slot.resolve(body.gate_id, body.answer) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            debug!("answer rejected: {e}");
            let status = rejection_status(&e);
            (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
        }
    }
}
