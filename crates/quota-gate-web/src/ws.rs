//! WebSocket upgrade handler and message dispatch.
//!
//! Each connected client receives:
//! 1. The prompt on display (or `null`) on connect.
//! 2. A fresh [`WsMessage::Gate`] every time the slot changes.
//!
//! Clients answer with `{"type":"answer","gate_id":N,"answer":"proceed"}`.
//! A rejected answer is reported back to that client only.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use quota_gate::gate::{GateAnswer, GateId, GateSlot, GateSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::AppState;

/// Server→client message.
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// The prompt now on display; `None` when the slot is empty.
    Gate { gate: Option<GateSnapshot> },
    /// The client's last answer was not applied.
    Rejected { gate_id: GateId, reason: String },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Answer { gate_id: GateId, answer: GateAnswer },
}

/// GET /ws: WebSocket upgrade handler.
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app.slot))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, slot: Arc<GateSlot>) {
    let (mut sink, mut stream) = socket.split();

    let mut changes = slot.subscribe();
    let initial = WsMessage::Gate {
        gate: slot.snapshot(),
    };
    if ws_send(&mut sink, &initial).await.is_err() {
        return;
    }
    debug!("WebSocket client connected");

    // Replies to this client share the sink with slot updates.
    let (reply_tx, mut reply_rx) = mpsc::channel::<WsMessage>(16);
    let forward_slot = slot.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    WsMessage::Gate { gate: forward_slot.snapshot() }
                }
                Some(reply) = reply_rx.recv() => reply,
            };
            if ws_send(&mut sink, &msg).await.is_err() {
                break; // Client disconnected.
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                if let Some(reply) = handle_client_message(&text, &slot) {
                    let _ = reply_tx.send(reply).await;
                }
            }
            Message::Close(_) => break,
            _ => {} // Ignore binary, ping, pong.
        }
    }

    debug!("WebSocket client disconnected");
    forward_task.abort();
}

/// Apply a JSON message received from a client. Returns a reply for that
/// client when the message was rejected.
fn handle_client_message(text: &str, slot: &GateSlot) -> Option<WsMessage> {
    let Ok(msg) = serde_json::from_str::<ClientMessage>(text) else {
        debug!("Ignoring malformed WebSocket message");
        return None;
    };

    match msg {
        ClientMessage::Answer { gate_id, answer } => match slot.resolve(gate_id, answer) {
            Ok(()) => None,
            Err(e) => Some(WsMessage::Rejected {
                gate_id,
                reason: e.to_string(),
            }),
        },
    }
}

/// Serialize a `WsMessage` and send it over the WebSocket sink.
async fn ws_send(sink: &mut SplitSink<WebSocket, Message>, msg: &WsMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
