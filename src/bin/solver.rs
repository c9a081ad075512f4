//! Payout Solver Service
//!
//! Main service binary that runs all solver services concurrently:
//! - Event source: polls the settlement chain for intent events
//! - Orchestrator: drives each intent through validation, bridging and confirmation
//! - Reconciliation monitor: sweeps in-flight intents on a fixed interval
//! - Status API: operator surface for intent lookup, stats and on-demand checks
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin solver -- --config config/solver.toml
//! ```
//!
//! Or set the config path via environment variable:
//!
//! ```bash
//! SOLVER_CONFIG_PATH=config/solver.toml cargo run --bin solver
//! ```

use anyhow::Result;
use clap::Parser;
use payout_solver::{
    api::run_status_server,
    bridge::AxelarBridgeClient,
    chains::EvmSettlementClient,
    config::SolverConfig,
    service::{ChainEventSource, ReconciliationMonitor, SolverOrchestrator},
    store::MemoryIntentStore,
};
use std::sync::Arc;
use tokio::signal;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "solver")]
#[command(about = "Payout solver service - observes settlement intents and fulfills them over a bridge")]
struct Args {
    /// Path to solver configuration file (default: config/solver.toml or SOLVER_CONFIG_PATH env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments first (before initializing logging)
    let args = Args::parse();

    // Initialize structured logging
    tracing_subscriber::fmt::init();

    info!("Starting Payout Solver Service");

    // Load configuration
    // Priority: CLI arg > env var > default
    let config = if let Some(path) = args.config {
        info!("Loading configuration from: {}", path);
        SolverConfig::load_from_path(Some(&path))?
    } else {
        if let Ok(path) = std::env::var("SOLVER_CONFIG_PATH") {
            info!("Loading configuration from SOLVER_CONFIG_PATH: {}", path);
        } else {
            info!("Loading configuration from default location");
        }
        SolverConfig::load()?
    };

    info!("Configuration loaded successfully");
    info!(
        "Source chain: {} (chain ID: {}, contract {})",
        config.source_chain.name, config.source_chain.chain_id, config.source_chain.contract_address
    );
    info!("Bridge provider: {} ({})", config.bridge.api_url, config.bridge.environment);
    info!(
        "Destination chains: {}",
        config
            .destination_chains
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    // Wire up shared components
    let store: Arc<dyn payout_solver::store::IntentStore> = Arc::new(MemoryIntentStore::new());
    let settlement: Arc<dyn payout_solver::chains::SettlementClient> =
        Arc::new(EvmSettlementClient::new(&config.source_chain)?);
    let gateway: Arc<dyn payout_solver::bridge::BridgeGateway> =
        Arc::new(AxelarBridgeClient::new(&config.bridge)?);

    let monitor = Arc::new(ReconciliationMonitor::new(
        &config,
        store.clone(),
        gateway.clone(),
        settlement.clone(),
    ));
    info!("Reconciliation monitor initialized");

    let (event_source, events) = ChainEventSource::new(settlement.clone(), &config);
    info!("Event source initialized at block {}", event_source.checkpoint());

    let orchestrator = SolverOrchestrator::new(
        config.clone(),
        store.clone(),
        gateway,
        settlement,
        monitor.clone(),
    );
    info!("Orchestrator initialized");

    // Re-process anything left over from a previous run before new events flow
    orchestrator.recover().await?;

    let status_host = config.service.status_api_host.clone();
    let status_port = config.service.status_api_port;
    let status_server = run_status_server(store, monitor.clone(), status_host, status_port);

    info!("Starting all services...");

    tokio::select! {
        // Source chain event subscription
        _ = event_source.run() => {}

        // Intent lifecycle orchestration
        _ = orchestrator.run(events) => {}

        // Periodic reconciliation sweep
        _ = monitor.run() => {}

        // Operator status API
        _ = status_server => {}

        // Graceful shutdown on Ctrl+C
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping services...");
        }
    }

    info!("Payout solver service stopped");
    Ok(())
}
