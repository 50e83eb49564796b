//! Axum server setup and router construction.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use quota_gate::gate::GateSlot;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::{self, AppState};
use crate::ws;

/// Build the full axum router.
///
/// The router serves:
/// - WebSocket at `/ws`
/// - REST API at `/api/gate` and `/api/answer`
pub fn build_router(slot: Arc<GateSlot>) -> Router {
    // Browser frontends are usually served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/gate", get(api::get_gate))
        .route("/api/answer", post(api::post_answer))
        .with_state(AppState { slot })
        .layer(cors)
}

/// Bind `bind_addr`, serve `router` in the background and return the bound
/// address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;
    info!("gate server listening on http://{addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            warn!("gate server stopped: {e}");
        }
    });

    Ok(addr)
}
