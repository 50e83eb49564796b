//! HTTP frontend for answering `quota-gate` prompts from a browser.
//!
//! `quota-gate-web` serves a shared [`GateSlot`] over axum. Flows running
//! with a [`SlotGate`](quota_gate::gate::SlotGate) present their prompts into
//! the slot; any HTTP or WebSocket client can read the prompt on display and
//! answer it.
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use quota_gate::prelude::*;
//! use quota_gate_web::{WebConfig, spawn_web};
//!
//! let slot = Arc::new(GateSlot::new());
//! let addr = spawn_web(slot.clone(), WebConfig::default()).await?;
//! println!("Answer prompts at http://{addr}/api/gate");
//!
//! let orchestrator = Orchestrator::new(HttpApi::new(&config)?, SlotGate::new(slot));
//! orchestrator.run(request).await?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! Orchestrator ──SlotGate──▶ GateSlot ◀── GET /api/gate, POST /api/answer
//!                               │
//!                               └─watch──▶ /ws clients (pushed on every change)
//! ```
//!
//! Answers carry the [`GateId`](quota_gate::gate::GateId) they respond to.
//! An answer for a prompt that has since been replaced is rejected and
//! changes nothing.

mod api;
mod server;
mod ws;

pub use api::AnswerRequest;
pub use ws::WsMessage;

use std::net::SocketAddr;
use std::sync::Arc;

use quota_gate::gate::GateSlot;

/// Configuration for the web server.
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:3001`.
    pub bind_addr: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// The server runs until the Tokio runtime shuts down.
pub async fn spawn_web(slot: Arc<GateSlot>, config: WebConfig) -> std::io::Result<SocketAddr> {
    let router = server::build_router(slot);
    server::start_server(router, config.bind_addr).await
}
