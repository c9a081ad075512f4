//! Payout solver library
//!
//! Listens for payout intents on a settlement chain, executes the matching
//! cross-chain transfer through a bridge provider, reconciles in-flight
//! transfers, and writes confirmations back to the settlement contract.

pub mod api;
pub mod bridge;
pub mod chains;
pub mod config;
pub mod intent;
pub mod service;
pub mod store;

// Re-export public types for convenience
pub use bridge::{AxelarBridgeClient, BridgeError, BridgeGateway, BridgeStatus, BridgeTransferState, TransferRequest};
pub use chains::{Confirmation, EvmSettlementClient, IntentCompletedEvent, IntentCreatedEvent, SettlementClient};
pub use config::SolverConfig;
pub use intent::{IntentStatus, PayoutIntent, ValidationError};
pub use service::{ChainEvent, ChainEventSource, MonitorStats, ReconciliationMonitor, SolverOrchestrator};
pub use store::{IntentPatch, IntentStore, MemoryIntentStore, StoreError};
