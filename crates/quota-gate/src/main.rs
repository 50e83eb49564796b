//! Run confirmation-gated operations against a quota-bearing API server.
//!
//! Reads the server URL from `--base-url` or `QUOTA_GATE_URL`. Log
//! verbosity follows `QUOTA_GATE_LOG` (default `info`).
//!
//! # Examples
//!
//! ```sh
//! # Search a district, probing the cache first
//! quota-gate search Seoul Gangnam-gu --months 12 --search-type rent
//!
//! # Regional step-1 search
//! quota-gate step1 Seoul Gangnam-gu
//!
//! # Refresh one named entity, exporting the tracking record
//! quota-gate --export-dir out refresh "Raemian One" 11680
//!
//! # Show the estimate only; nothing costed is issued
//! quota-gate estimate refresh "Raemian One" 11680
//!
//! # Non-interactive: proceed at every confirmation, prefer caches
//! quota-gate --auto-confirm search Seoul Gangnam-gu
//! ```

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use quota_gate::gate::ConfirmationPrompt;
use quota_gate::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_ENV: &str = "QUOTA_GATE_LOG";

/// Run confirmation-gated operations against a quota-bearing API server.
#[derive(Parser)]
#[command(name = "quota-gate", version)]
struct Cli {
    /// API server base URL (overrides QUOTA_GATE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Directory for exported tracking records (overrides QUOTA_GATE_EXPORT_DIR)
    #[arg(long, global = true)]
    export_dir: Option<PathBuf>,

    /// Proceed at every confirmation and use caches when offered
    #[arg(long, global = true)]
    auto_confirm: bool,

    /// Do not export the tracking record after a costed call
    #[arg(long, global = true)]
    no_export: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search a district, offering a cached result when one exists
    Search(SearchArgs),
    /// Regional search over a whole district
    Step1(Step1Args),
    /// Refresh one named entity in a region
    Refresh(RefreshArgs),
    /// Print the cost estimate for an operation without running it
    Estimate {
        #[command(subcommand)]
        operation: Operation,
    },
}

#[derive(Subcommand)]
enum Operation {
    Search(SearchArgs),
    Step1(Step1Args),
    Refresh(RefreshArgs),
}

impl Operation {
    fn request(&self) -> OperationRequest {
        match self {
            Operation::Search(args) => args.request(),
            Operation::Step1(args) => args.request(),
            Operation::Refresh(args) => args.request(),
        }
    }
}

#[derive(Args)]
struct SearchArgs {
    city: String,
    district: String,

    /// Restrict to one named entity
    #[arg(long)]
    apt_name: Option<String>,

    /// Months of history to cover
    #[arg(long, default_value_t = quota_gate::request::DEFAULT_MONTHS)]
    months: u32,

    /// sale, rent or all
    #[arg(long, default_value = "sale")]
    search_type: SearchType,

    /// Ignore server-side caches
    #[arg(long)]
    force_refresh: bool,

    #[arg(long)]
    start_date: Option<String>,

    #[arg(long)]
    end_date: Option<String>,
}

impl SearchArgs {
    fn request(&self) -> OperationRequest {
        let mut params = SearchParams::new(&self.city, &self.district)
            .with_months(self.months)
            .with_search_type(self.search_type)
            .with_force_refresh(self.force_refresh);
        if let Some(name) = &self.apt_name {
            params = params.with_apt_name(name);
        }
        // A half-open range is passed through and rejected by validation.
        params.start_date = self.start_date.clone();
        params.end_date = self.end_date.clone();
        OperationRequest::search(params)
    }
}

#[derive(Args)]
struct Step1Args {
    city: String,
    district: String,

    /// sale, rent or all
    #[arg(long, default_value = "sale")]
    search_type: SearchType,
}

impl Step1Args {
    fn request(&self) -> OperationRequest {
        OperationRequest::step1(
            Step1Params::new(&self.city, &self.district).with_search_type(self.search_type),
        )
    }
}

#[derive(Args)]
struct RefreshArgs {
    /// Name of the entity to refresh
    name: String,
    /// Numeric region code
    region_code: String,

    /// Months of history to cover
    #[arg(long, default_value_t = quota_gate::request::DEFAULT_MONTHS)]
    months: u32,
}

impl RefreshArgs {
    fn request(&self) -> OperationRequest {
        OperationRequest::refresh(
            RefreshParams::new(&self.name, &self.region_code).with_months(self.months),
        )
    }
}

// ── Gates ──────────────────────────────────────────────────────────

fn auto_gate() -> Arc<dyn ConfirmationGate> {
    Arc::new(FnGate::new(
        |estimate: &Estimate| {
            info!(
                "auto-confirming {} calls, {}, quota {:.1}%",
                estimate.predicted_call_count,
                estimate.predicted_duration.display,
                estimate.quota.usage_percentage()
            );
            Decision::Proceed
        },
        |cache: &CacheInfo| {
            info!(
                "using cache for {} ({} records)",
                cache.region_label, cache.record_count
            );
            CacheDecision::UseCache
        },
    ))
}

// ── Commands ───────────────────────────────────────────────────────

async fn run(cli: Cli) -> Result<(), GateError> {
    let mut config = GateConfig::from_env()?;
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url.clone());
    }
    if let Some(dir) = &cli.export_dir {
        config = config.with_export_dir(dir.clone());
    }
    let api = HttpApi::new(&config)?;

    let request = match &cli.command {
        Command::Estimate { operation } => {
            let estimate = api.estimate(&operation.request()).await?;
            println!("{}", ConfirmationPrompt::from_estimate(&estimate).render());
            return Ok(());
        }
        Command::Search(args) => args.request(),
        Command::Step1(args) => args.request(),
        Command::Refresh(args) => args.request(),
    };

    let gate: Arc<dyn ConfirmationGate> = if cli.auto_confirm {
        auto_gate()
    } else {
        Arc::new(TerminalGate::stdio())
    };
    let orchestrator = Orchestrator::new(api, gate).with_observer(LoggingObserver);

    match orchestrator.run(request).await? {
        FlowOutcome::Cancelled(reason) => {
            eprintln!("{reason}; nothing was charged");
            return Ok(());
        }
        FlowOutcome::Completed(result) => {
            println!("{}", serde_json::to_string_pretty(&result.payload)?);
        }
    }

    if let Some(report) = orchestrator.reporter().current_report() {
        println!("\n{}", report.render());
        if !cli.no_export {
            let path = orchestrator.reporter().export(&config.export_dir)?;
            eprintln!("Tracking record exported to {}", path.display());
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        if let Some(raw) = e.raw_response() {
            eprintln!("{raw}");
        }
        process::exit(1);
    }
}
