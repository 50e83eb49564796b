//! Run one quota-gate operation and answer its prompts from a browser.
//!
//! Starts the gate server, then runs the requested flow with a
//! [`SlotGate`]. Each prompt the flow raises appears at `GET /api/gate` and
//! on the `/ws` socket until it is answered.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p quota-gate-web -- refresh "Raemian One" 11680
//! cargo run -p quota-gate-web -- --port 8080 search Seoul Gangnam-gu
//! ```
//!
//! ## Answering
//!
//! **REST** (`POST /api/answer`):
//! ```json
//! {"gate_id": 1, "answer": "proceed"}
//! ```
//!
//! **WebSocket** (connect to `/ws`):
//! ```json
//! {"type": "answer", "gate_id": 1, "answer": "use_cache"}
//! ```

use std::sync::Arc;

use clap::{Parser, Subcommand};
use quota_gate::prelude::*;
use quota_gate_web::{WebConfig, spawn_web};

/// Run one operation with browser-answered prompts.
#[derive(Parser)]
#[command(about = "Run a quota-gate operation with a browser-based gate")]
struct Args {
    /// Port for the gate server.
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// API server base URL (overrides QUOTA_GATE_URL).
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    operation: Operation,
}

#[derive(Subcommand)]
enum Operation {
    /// Search a district, offering a cached result when one exists.
    Search { city: String, district: String },
    /// Regional search over a whole district.
    Step1 { city: String, district: String },
    /// Refresh one named entity in a region.
    Refresh { name: String, region_code: String },
}

impl Operation {
    fn request(self) -> OperationRequest {
        match self {
            Operation::Search { city, district } => {
                OperationRequest::search(SearchParams::new(city, district))
            }
            Operation::Step1 { city, district } => {
                OperationRequest::step1(Step1Params::new(city, district))
            }
            Operation::Refresh { name, region_code } => {
                OperationRequest::refresh(RefreshParams::new(name, region_code))
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = Args::parse();

    let mut config = GateConfig::from_env().map_err(|e| e.to_string())?;
    if let Some(url) = args.base_url {
        config = config.with_base_url(url);
    }
    let api = HttpApi::new(&config).map_err(|e| e.to_string())?;

    // 1. Shared slot, served over HTTP.
    let slot = Arc::new(GateSlot::new());
    let web_config = WebConfig {
        bind_addr: ([127, 0, 0, 1], args.port).into(),
    };
    let addr = spawn_web(slot.clone(), web_config)
        .await
        .map_err(|e| format!("failed to start gate server: {e}"))?;
    println!("Gate: http://{addr}/api/gate");

    // 2. Run the flow; its prompts wait in the slot.
    let orchestrator =
        Orchestrator::new(api, SlotGate::new(slot)).with_observer(LoggingObserver);
    let outcome = orchestrator
        .run(args.operation.request())
        .await
        .map_err(|e| e.to_string())?;

    match outcome {
        FlowOutcome::Completed(result) => {
            let payload =
                serde_json::to_string_pretty(&result.payload).map_err(|e| e.to_string())?;
            println!("{payload}");
        }
        FlowOutcome::Cancelled(reason) => println!("{reason}"),
    }
    if let Some(report) = orchestrator.reporter().current_report() {
        println!("\n{}", report.render());
    }
    Ok(())
}
