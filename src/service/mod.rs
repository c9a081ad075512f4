//! Solver service modules
//!
//! This module contains the long-running service loops of the payout solver:
//! the checkpointed source-chain event subscription, the event-driven intent
//! orchestrator, and the periodic reconciliation sweep.

pub mod listener;
pub mod monitor;
pub mod solver;

// Re-export for convenience
pub use listener::{ChainEvent, ChainEventSource};
pub use monitor::{MonitorStats, ReconciliationMonitor};
pub use solver::SolverOrchestrator;
