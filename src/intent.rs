//! Payout Intent Domain Model
//!
//! The payout intent is the single core entity of the solver: a durable record
//! expressing that a payout owed to a winner must be delivered on a specified
//! destination chain. Its lifecycle follows a fixed transition DAG enforced by
//! [`IntentStatus::can_transition_to`]; terminal records are append-only.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::config::SolverConfig;

/// Lifecycle state of a payout intent.
///
/// Transitions follow a fixed DAG:
/// Pending -> Processing -> {Completed, Failed}; Cancelled is reachable only
/// from Pending or Processing. Completed, Failed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    /// Intent observed but bridge execution not yet started
    Pending,
    /// Bridge execution started; transfer may be in flight
    Processing,
    /// Transfer landed and confirmation write-back applied
    Completed,
    /// Permanently failed; `failure_reason` records why
    Failed,
    /// Explicitly cancelled before completion
    Cancelled,
}

impl IntentStatus {
    /// Returns true if no further status writes are permitted from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IntentStatus::Completed | IntentStatus::Failed | IntentStatus::Cancelled
        )
    }

    /// Returns true if the transition `self -> next` is allowed by the DAG.
    ///
    /// The Processing self-edge carries patch-only writes (recording bridge
    /// transaction hashes) through the same compare-and-swap primitive as
    /// status changes; it does not alter the lifecycle DAG.
    pub fn can_transition_to(&self, next: IntentStatus) -> bool {
        match (self, next) {
            (IntentStatus::Pending, IntentStatus::Processing) => true,
            (IntentStatus::Processing, IntentStatus::Processing) => true,
            (IntentStatus::Pending, IntentStatus::Cancelled) => true,
            (IntentStatus::Processing, IntentStatus::Completed) => true,
            (IntentStatus::Processing, IntentStatus::Failed) => true,
            (IntentStatus::Processing, IntentStatus::Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntentStatus::Pending => "pending",
            IntentStatus::Processing => "processing",
            IntentStatus::Completed => "completed",
            IntentStatus::Failed => "failed",
            IntentStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// A payout intent record.
///
/// `id` is the natural key (source bet identifier) and is globally unique:
/// the store enforces create-once per id. Amounts are integer smallest-unit
/// values; no floating point is used anywhere in the payout path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutIntent {
    /// Natural key: source bet identifier
    pub id: String,
    /// Winner address on the destination chain
    pub winner_address: String,
    /// Destination chain name (must be in the configured supported set)
    pub destination_chain: String,
    /// Token symbol to deliver
    pub token: String,
    /// Amount in smallest indivisible units
    pub amount: u128,
    /// Transaction that created the intent on the source chain
    pub source_tx_hash: Option<String>,
    /// Bridge transfer transaction on the source side
    pub bridge_source_tx_hash: Option<String>,
    /// Bridge transfer transaction on the destination side
    pub bridge_target_tx_hash: Option<String>,
    /// Current lifecycle state
    pub status: IntentStatus,
    /// Human-readable failure reason (set only when Failed)
    pub failure_reason: Option<String>,
    /// Unix timestamp (seconds) when the record was created
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last status write
    pub updated_at: u64,
}

impl PayoutIntent {
    /// Creates a new Pending intent record.
    pub fn new(
        id: String,
        winner_address: String,
        destination_chain: String,
        token: String,
        amount: u128,
        source_tx_hash: Option<String>,
    ) -> Self {
        let now = unix_now();
        Self {
            id,
            winner_address,
            destination_chain,
            token,
            amount,
            source_tx_hash,
            bridge_source_tx_hash: None,
            bridge_target_tx_hash: None,
            status: IntentStatus::Pending,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validates the intent against the invariants the store must never see
    /// violated. Runs before any persistence.
    ///
    /// Checks:
    /// - `amount > 0`
    /// - winner address is non-empty and not the zero address
    /// - destination chain is in the configured supported set
    /// - token is supported on the destination chain
    pub fn validate(&self, config: &SolverConfig) -> Result<(), ValidationError> {
        if self.amount == 0 {
            return Err(ValidationError::ZeroAmount { id: self.id.clone() });
        }
        if self.winner_address.is_empty() || is_zero_address(&self.winner_address) {
            return Err(ValidationError::InvalidWinnerAddress { id: self.id.clone() });
        }
        if !config.supports_chain(&self.destination_chain) {
            return Err(ValidationError::UnsupportedChain {
                id: self.id.clone(),
                chain: self.destination_chain.clone(),
            });
        }
        if !config.supports_token(&self.destination_chain, &self.token) {
            return Err(ValidationError::UnsupportedToken {
                id: self.id.clone(),
                chain: self.destination_chain.clone(),
                token: self.token.clone(),
            });
        }
        Ok(())
    }
}

/// Malformed-intent errors, rejected before any persistence occurs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Amount must be strictly positive
    #[error("intent {id}: amount must be greater than zero")]
    ZeroAmount { id: String },
    /// Winner address is empty or the zero address
    #[error("intent {id}: winner address is empty or zero")]
    InvalidWinnerAddress { id: String },
    /// Destination chain is not in the configured supported set
    #[error("intent {id}: unsupported destination chain '{chain}'")]
    UnsupportedChain { id: String, chain: String },
    /// Token is not supported on the destination chain
    #[error("intent {id}: token '{token}' not supported on chain '{chain}'")]
    UnsupportedToken {
        id: String,
        chain: String,
        token: String,
    },
}

/// Returns true for 0x-prefixed all-zero addresses of any length.
fn is_zero_address(addr: &str) -> bool {
    let stripped = addr.strip_prefix("0x").unwrap_or(addr);
    !stripped.is_empty() && stripped.chars().all(|c| c == '0')
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
