//! Shared test helpers for payout solver tests
//!
//! Provides constants, config builders and deterministic fakes for the bridge
//! gateway and settlement client seams.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use payout_solver::bridge::{
    BridgeError, BridgeGateway, BridgeStatus, BridgeTransferState, TransferRequest,
};
use payout_solver::chains::{
    Confirmation, IntentCompletedEvent, IntentCreatedEvent, SettlementClient,
};
use payout_solver::config::{
    BridgeConfig, DestinationChainConfig, RetryConfig, ServiceConfig, SolverConfig,
    SourceChainConfig,
};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Dummy intent ID (decimal string form of the on-chain uint256)
pub const DUMMY_INTENT_ID: &str = "42";

/// Dummy winner address (EVM format, 40 hex characters)
pub const DUMMY_WINNER_ADDR: &str = "0x00000000000000000000000000000000000000a1";

/// Dummy settlement contract address
pub const DUMMY_CONTRACT_ADDR: &str = "0x00000000000000000000000000000000000000c0";

/// Dummy solver account address
pub const DUMMY_SOLVER_ADDR: &str = "0x00000000000000000000000000000000000000d0";

/// Dummy source-chain transaction that created the intent
pub const DUMMY_SOURCE_TX: &str = "0xaaa1";

/// Dummy bridge source-side transaction hash
pub const DUMMY_BRIDGE_TX: &str = "0xabc";

/// Dummy bridge destination-side transaction hash
pub const DUMMY_TARGET_TX: &str = "0xdef";

/// Dummy confirmation write-back transaction hash
pub const DUMMY_CONFIRM_TX: &str = "0xccc1";

// ============================================================================
// CONFIG BUILDERS
// ============================================================================

/// Create a default service config with test values.
pub fn create_default_service_config() -> ServiceConfig {
    ServiceConfig {
        listener_poll_interval_ms: 50,
        sweep_interval_secs: 30,
        sweep_worker_cap: 4,
        status_api_host: "127.0.0.1".to_string(),
        status_api_port: 4455,
    }
}

/// Create a default source chain config with test values.
pub fn create_default_source_chain_config() -> SourceChainConfig {
    SourceChainConfig {
        name: "celo".to_string(),
        rpc_url: "http://127.0.0.1:8545".to_string(),
        chain_id: 44787,
        contract_address: DUMMY_CONTRACT_ADDR.to_string(),
        solver_address: DUMMY_SOLVER_ADDR.to_string(),
        from_block: 0,
        request_timeout_ms: 5000,
    }
}

/// Create a default solver config with test values.
///
/// Backoff delays are shrunk to single milliseconds so retry tests run fast.
/// This can be customized using Rust's struct update syntax:
/// ```
/// let config = SolverConfig {
///     retry: RetryConfig { max_retries: 1, ..Default::default() },
///     ..create_default_solver_config()
/// };
/// ```
pub fn create_default_solver_config() -> SolverConfig {
    SolverConfig {
        service: create_default_service_config(),
        source_chain: create_default_source_chain_config(),
        bridge: BridgeConfig {
            api_url: "http://127.0.0.1:9999".to_string(),
            environment: "testnet".to_string(),
            request_timeout_ms: 5000,
        },
        retry: RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            backoff_factor: 2,
        },
        destination_chains: vec![
            DestinationChainConfig {
                name: "polygon".to_string(),
                tokens: vec!["cUSD".to_string(), "USDC".to_string()],
            },
            DestinationChainConfig {
                name: "avalanche".to_string(),
                tokens: vec!["USDC".to_string()],
            },
        ],
    }
}

/// Create a default intent-created event with test values.
pub fn create_default_created_event() -> IntentCreatedEvent {
    IntentCreatedEvent {
        id: DUMMY_INTENT_ID.to_string(),
        winner: DUMMY_WINNER_ADDR.to_string(),
        target_chain: "polygon".to_string(),
        amount: 500_000,
        token: "cUSD".to_string(),
        timestamp: 1_700_000_000,
        tx_hash: DUMMY_SOURCE_TX.to_string(),
        block_number: 3,
    }
}

// ============================================================================
// FAKE BRIDGE GATEWAY
// ============================================================================

/// Scripted bridge gateway.
///
/// `execute()` pops results from a queue (default success with
/// [`DUMMY_BRIDGE_TX`] when the queue is empty) and records every request;
/// `query_status()` reads from a per-hash status table (default pending).
pub struct FakeBridge {
    pub fee: u128,
    execute_results: Mutex<VecDeque<Result<String, BridgeError>>>,
    pub execute_calls: Mutex<Vec<TransferRequest>>,
    statuses: Mutex<HashMap<String, (BridgeTransferState, Option<String>)>>,
}

impl FakeBridge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fee: 500,
            execute_results: Mutex::new(VecDeque::new()),
            execute_calls: Mutex::new(Vec::new()),
            statuses: Mutex::new(HashMap::new()),
        })
    }

    /// Queue a successful execute result.
    pub fn push_execute_ok(&self, tx_hash: &str) {
        self.execute_results
            .lock()
            .unwrap()
            .push_back(Ok(tx_hash.to_string()));
    }

    /// Queue a failing execute result.
    pub fn push_execute_err(&self, err: BridgeError) {
        self.execute_results.lock().unwrap().push_back(Err(err));
    }

    /// Script the provider-side state for a bridge transaction.
    pub fn set_status(&self, tx_hash: &str, state: BridgeTransferState, target_tx: Option<&str>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(tx_hash.to_string(), (state, target_tx.map(String::from)));
    }

    /// Number of execute calls recorded so far.
    pub fn execute_count(&self) -> usize {
        self.execute_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BridgeGateway for FakeBridge {
    async fn estimate_fee(
        &self,
        _source_chain: &str,
        _dest_chain: &str,
        _amount: u128,
        _token: &str,
    ) -> Result<u128, BridgeError> {
        Ok(self.fee)
    }

    async fn execute(&self, request: &TransferRequest) -> Result<String, BridgeError> {
        self.execute_calls.lock().unwrap().push(request.clone());
        self.execute_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(DUMMY_BRIDGE_TX.to_string()))
    }

    async fn query_status(
        &self,
        bridge_tx_hash: &str,
        _source_chain: &str,
        _dest_chain: &str,
    ) -> Result<BridgeStatus, BridgeError> {
        let statuses = self.statuses.lock().unwrap();
        let (state, target_tx_hash) = statuses
            .get(bridge_tx_hash)
            .cloned()
            .unwrap_or((BridgeTransferState::Pending, None));
        Ok(BridgeStatus {
            state,
            target_tx_hash,
        })
    }
}

// ============================================================================
// FAKE SETTLEMENT CLIENT
// ============================================================================

/// Recording settlement client.
///
/// Event logs are scripted via the public vectors; `confirm_payout` keeps a
/// processed set so repeated confirmations surface as
/// [`Confirmation::AlreadyProcessed`], matching the contract's behavior.
pub struct FakeSettlement {
    pub latest: AtomicU64,
    pub created: Mutex<Vec<IntentCreatedEvent>>,
    pub completed: Mutex<Vec<IntentCompletedEvent>>,
    pub processed: Mutex<HashSet<String>>,
    pub confirm_calls: Mutex<Vec<(String, bool, String)>>,
    /// Number of confirm attempts that should error before one succeeds
    pub confirm_failures: AtomicU32,
    /// When set, every RPC-shaped call errors
    pub rpc_down: AtomicBool,
}

impl FakeSettlement {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            latest: AtomicU64::new(10),
            created: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            processed: Mutex::new(HashSet::new()),
            confirm_calls: Mutex::new(Vec::new()),
            confirm_failures: AtomicU32::new(0),
            rpc_down: AtomicBool::new(false),
        })
    }

    /// Script an intent-created log.
    pub fn push_created(&self, event: IntentCreatedEvent) {
        self.created.lock().unwrap().push(event);
    }

    /// Mark an intent as already confirmed on the contract.
    pub fn mark_processed(&self, id: &str) {
        self.processed.lock().unwrap().insert(id.to_string());
    }

    /// Number of accepted confirmation write-backs.
    pub fn confirm_count(&self) -> usize {
        self.confirm_calls.lock().unwrap().len()
    }

    fn check_rpc(&self) -> anyhow::Result<()> {
        if self.rpc_down.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl SettlementClient for FakeSettlement {
    async fn latest_block(&self) -> anyhow::Result<u64> {
        self.check_rpc()?;
        Ok(self.latest.load(Ordering::SeqCst))
    }

    async fn intent_created_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> anyhow::Result<Vec<IntentCreatedEvent>> {
        self.check_rpc()?;
        Ok(self
            .created
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.block_number >= from_block && e.block_number <= to_block)
            .cloned()
            .collect())
    }

    async fn intent_completed_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> anyhow::Result<Vec<IntentCompletedEvent>> {
        self.check_rpc()?;
        Ok(self
            .completed
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.block_number >= from_block && e.block_number <= to_block)
            .cloned()
            .collect())
    }

    async fn is_intent_processed(&self, id: &str) -> anyhow::Result<bool> {
        self.check_rpc()?;
        Ok(self.processed.lock().unwrap().contains(id))
    }

    async fn confirm_payout(
        &self,
        id: &str,
        success: bool,
        tx_hash: &str,
    ) -> anyhow::Result<Confirmation> {
        self.check_rpc()?;
        if self.confirm_failures.load(Ordering::SeqCst) > 0 {
            self.confirm_failures.fetch_sub(1, Ordering::SeqCst);
            anyhow::bail!("confirmation transaction rejected");
        }
        let mut processed = self.processed.lock().unwrap();
        if processed.contains(id) {
            return Ok(Confirmation::AlreadyProcessed);
        }
        processed.insert(id.to_string());
        self.confirm_calls
            .lock()
            .unwrap()
            .push((id.to_string(), success, tx_hash.to_string()));
        Ok(Confirmation::Submitted(DUMMY_CONFIRM_TX.to_string()))
    }
}
