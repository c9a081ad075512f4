//! Settlement Chain Clients
//!
//! One solver core, pluggable settlement-chain backends: the orchestrator and
//! listener talk to the settlement contract exclusively through the
//! [`SettlementClient`] trait, and the concrete client is selected per
//! network via configuration.

pub mod evm;

// Re-export for convenience
pub use evm::EvmSettlementClient;

use async_trait::async_trait;

/// Decoded `IntentCreated(id, winner, targetChain, amount, token, timestamp)`
/// log from the settlement contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentCreatedEvent {
    /// Source bet identifier (decimal string form of the on-chain uint256)
    pub id: String,
    /// Winner address
    pub winner: String,
    /// Destination chain name
    pub target_chain: String,
    /// Payout amount in smallest units
    pub amount: u128,
    /// Token symbol
    pub token: String,
    /// Contract-side timestamp (unix seconds)
    pub timestamp: u64,
    /// Transaction that emitted the event
    pub tx_hash: String,
    /// Block the event was emitted in
    pub block_number: u64,
}

/// Decoded `IntentCompleted(id, success, txHash, timestamp)` log from the
/// settlement contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentCompletedEvent {
    /// Source bet identifier
    pub id: String,
    /// Whether the payout was reported successful
    pub success: bool,
    /// Destination-side transaction hash recorded by the confirmation
    pub tx_hash: String,
    /// Contract-side timestamp (unix seconds)
    pub timestamp: u64,
    /// Block the event was emitted in
    pub block_number: u64,
}

/// Outcome of a confirmation write-back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Confirmation transaction accepted; hash of the write-back transaction
    Submitted(String),
    /// The contract already holds a confirmation for this id. Treated as
    /// success by callers; this is what makes repeated confirmation attempts
    /// from the orchestrator and the monitor safe.
    AlreadyProcessed,
}

/// Client for the settlement contract on the source chain.
///
/// Event reads are stateless; `confirm_payout` is authorized by the
/// solver-held signing credential and must be safe to call more than once
/// for the same id.
#[async_trait]
pub trait SettlementClient: Send + Sync {
    /// Returns the latest block number on the source chain.
    async fn latest_block(&self) -> anyhow::Result<u64>;

    /// Fetches `IntentCreated` logs in the inclusive block range.
    async fn intent_created_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> anyhow::Result<Vec<IntentCreatedEvent>>;

    /// Fetches `IntentCompleted` logs in the inclusive block range.
    async fn intent_completed_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> anyhow::Result<Vec<IntentCompletedEvent>>;

    /// Returns true if the contract already marks this intent as processed.
    async fn is_intent_processed(&self, id: &str) -> anyhow::Result<bool>;

    /// Submits `confirmPayout(id, success, txHash)` to the settlement
    /// contract.
    ///
    /// Implementations must map the contract's "already processed" rejection
    /// to [`Confirmation::AlreadyProcessed`] instead of an error.
    async fn confirm_payout(
        &self,
        id: &str,
        success: bool,
        tx_hash: &str,
    ) -> anyhow::Result<Confirmation>;
}
