//! Payout Solver Orchestrator
//!
//! Consumes decoded settlement-contract events and drives each payout intent
//! through its lifecycle: validate, persist, claim via compare-and-swap,
//! execute on the bridge with bounded retries, then hand off to the
//! reconciliation monitor for the confirmation write-back.
//!
//! All collaborators are injected at construction; the orchestrator owns no
//! global state and can be instantiated multiple times in tests against
//! deterministic fakes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bridge::{BridgeError, BridgeGateway, TransferRequest};
use crate::chains::{IntentCompletedEvent, IntentCreatedEvent, SettlementClient};
use crate::config::SolverConfig;
use crate::intent::{IntentStatus, PayoutIntent};
use crate::service::listener::ChainEvent;
use crate::service::monitor::ReconciliationMonitor;
use crate::store::{IntentPatch, IntentStore, StoreError};

/// Event-driven orchestrator for payout intents.
pub struct SolverOrchestrator {
    config: SolverConfig,
    store: Arc<dyn IntentStore>,
    gateway: Arc<dyn BridgeGateway>,
    settlement: Arc<dyn SettlementClient>,
    monitor: Arc<ReconciliationMonitor>,
}

impl SolverOrchestrator {
    /// Creates a new orchestrator.
    ///
    /// # Arguments
    ///
    /// * `config` - Solver configuration (retry bounds, supported routes)
    /// * `store` - Shared intent store
    /// * `gateway` - Bridge provider gateway
    /// * `settlement` - Settlement chain client
    /// * `monitor` - Reconciliation monitor for post-execute checks
    pub fn new(
        config: SolverConfig,
        store: Arc<dyn IntentStore>,
        gateway: Arc<dyn BridgeGateway>,
        settlement: Arc<dyn SettlementClient>,
        monitor: Arc<ReconciliationMonitor>,
    ) -> Self {
        Self {
            config,
            store,
            gateway,
            settlement,
            monitor,
        }
    }

    /// Main event loop. Runs until the event source closes the channel.
    pub async fn run(&self, mut events: mpsc::Receiver<ChainEvent>) {
        info!("Solver orchestrator started");
        while let Some(event) = events.recv().await {
            match event {
                ChainEvent::IntentCreated(created) => {
                    if let Err(e) = self.handle_intent_created(created).await {
                        error!("Failed to handle intent creation: {:#}", e);
                    }
                }
                ChainEvent::IntentCompleted(completed) => {
                    self.handle_intent_completed(completed).await;
                }
            }
        }
        info!("Event channel closed, orchestrator stopping");
    }

    /// Handles an `IntentCreated` event end to end.
    ///
    /// Duplicate deliveries are harmless: the create-once store rejects a
    /// second record for the same id, and the Pending -> Processing
    /// compare-and-swap makes exactly one caller the executor.
    pub async fn handle_intent_created(&self, event: IntentCreatedEvent) -> anyhow::Result<()> {
        let intent = PayoutIntent::new(
            event.id.clone(),
            event.winner.clone(),
            event.target_chain.clone(),
            event.token.clone(),
            event.amount,
            Some(event.tx_hash.clone()),
        );

        // Malformed intents are rejected before anything is persisted
        if let Err(e) = intent.validate(&self.config) {
            warn!("Rejecting malformed intent: {}", e);
            return Ok(());
        }

        match self.store.create(intent.clone()).await {
            Ok(()) => {
                info!(
                    "Intent {} recorded: {} {} to {} on {}",
                    intent.id, intent.amount, intent.token, intent.winner_address, intent.destination_chain
                );
            }
            Err(StoreError::AlreadyExists(_)) => {
                debug!("Intent {} already recorded, duplicate delivery", intent.id);
            }
            Err(e) => return Err(e.into()),
        }

        self.process_intent(&intent.id).await
    }

    /// Claims a Pending intent and runs the bridge execution for it.
    ///
    /// The Pending -> Processing transition is the execute gate: losing the
    /// compare-and-swap means another caller (duplicate event, recovery pass)
    /// already owns the execution, and this call returns without side effects.
    pub async fn process_intent(&self, id: &str) -> anyhow::Result<()> {
        let claimed = match self
            .store
            .transition(
                id,
                IntentStatus::Pending,
                IntentStatus::Processing,
                IntentPatch::default(),
            )
            .await
        {
            Ok(intent) => intent,
            Err(StoreError::Conflict { actual, .. }) => {
                debug!("Intent {} not claimable (status {}), skipping", id, actual);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        match self.execute_with_retry(&claimed).await {
            Ok(bridge_tx_hash) => {
                // Record the bridge hash before the monitor needs it; the
                // record stays Processing until the transfer finalizes.
                match self
                    .store
                    .transition(
                        id,
                        IntentStatus::Processing,
                        IntentStatus::Processing,
                        IntentPatch::bridge_source(&bridge_tx_hash),
                    )
                    .await
                {
                    Ok(_) => {}
                    Err(StoreError::Conflict { actual, .. }) => {
                        // A concurrent reconciliation finalized the record
                        // before the hash patch landed
                        warn!(
                            "Intent {} left Processing ({}) during bridge submission, tx {}",
                            id, actual, bridge_tx_hash
                        );
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                }
                info!(
                    "Intent {} submitted to bridge (source tx {})",
                    id, bridge_tx_hash
                );
                if let Err(e) = self.monitor.force_check(id).await {
                    // The periodic sweep will pick it up
                    debug!("Immediate post-submit check for {} failed: {:#}", id, e);
                }
                Ok(())
            }
            Err(e) => {
                warn!("Intent {} failed bridge execution: {}", id, e);
                match self
                    .store
                    .transition(
                        id,
                        IntentStatus::Processing,
                        IntentStatus::Failed,
                        IntentPatch::failure(e.to_string()),
                    )
                    .await
                {
                    Ok(_) => {
                        self.report_failure(id).await;
                        Ok(())
                    }
                    Err(StoreError::Conflict { .. }) => Ok(()),
                    Err(store_err) => Err(store_err.into()),
                }
            }
        }
    }

    /// Failure write-back so the contract learns the outcome.
    ///
    /// Best-effort: the local record is already Failed, and the contract's
    /// duplicate guard absorbs a repeat from the monitor.
    async fn report_failure(&self, id: &str) {
        if let Err(e) = self.settlement.confirm_payout(id, false, "").await {
            error!("Failure write-back for intent {} not accepted: {:#}", id, e);
        }
    }

    /// Submits the transfer to the bridge, retrying transient failures with
    /// exponential backoff.
    ///
    /// Delays grow as `base_delay_ms * backoff_factor^attempt`; permanent
    /// errors (unsupported route, insufficient fee) abort immediately.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Source-side bridge transaction hash
    /// * `Err(BridgeError)` - Last error after retries are exhausted
    async fn execute_with_retry(&self, intent: &PayoutIntent) -> Result<String, BridgeError> {
        let source_chain = &self.config.source_chain.name;
        let request = TransferRequest {
            intent_id: intent.id.clone(),
            recipient: intent.winner_address.clone(),
            source_chain: source_chain.clone(),
            dest_chain: intent.destination_chain.clone(),
            token: intent.token.clone(),
            amount: intent.amount,
        };
        let retry = &self.config.retry;

        let mut attempt: u32 = 0;
        loop {
            let result = async {
                let fee = self
                    .gateway
                    .estimate_fee(
                        source_chain,
                        &intent.destination_chain,
                        intent.amount,
                        &intent.token,
                    )
                    .await?;
                debug!(
                    "Fee estimate for intent {}: {} (amount {})",
                    intent.id, fee, intent.amount
                );
                self.gateway.execute(&request).await
            }
            .await;

            match result {
                Ok(tx_hash) => return Ok(tx_hash),
                Err(e) if e.is_transient() && attempt + 1 < retry.max_retries => {
                    let delay_ms = retry
                        .base_delay_ms
                        .saturating_mul(retry.backoff_factor.saturating_pow(attempt));
                    warn!(
                        "Bridge attempt {}/{} for intent {} failed ({}), retrying in {}ms",
                        attempt + 1,
                        retry.max_retries,
                        intent.id,
                        e,
                        delay_ms
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Handles an `IntentCompleted` event from the settlement contract.
    ///
    /// A completion for an intent this process already finalized is a no-op;
    /// a completion for an intent still Processing triggers an immediate
    /// reconciliation check so the local record catches up.
    pub async fn handle_intent_completed(&self, event: IntentCompletedEvent) {
        let intent = match self.store.get(&event.id).await {
            Ok(Some(intent)) => intent,
            Ok(None) => {
                debug!("Completion for unknown intent {}, ignoring", event.id);
                return;
            }
            Err(e) => {
                error!("Store lookup failed for completion of {}: {}", event.id, e);
                return;
            }
        };

        if intent.status.is_terminal() {
            debug!("Completion for finalized intent {}, ignoring", event.id);
            return;
        }
        if intent.status == IntentStatus::Processing {
            if let Err(e) = self.monitor.force_check(&event.id).await {
                warn!("Reconciliation check after completion event failed: {:#}", e);
            }
        }
    }

    /// Cancels an intent that has not yet entered bridge execution.
    ///
    /// Only Pending intents are cancellable. Once the execute gate has been
    /// claimed funds may already be moving, so a cancel of a Processing or
    /// terminal intent fails with `Conflict` and the lifecycle resolves
    /// through reconciliation instead.
    ///
    /// # Returns
    ///
    /// * `Ok(PayoutIntent)` - The cancelled record
    /// * `Err(StoreError)` - Not found, or no longer Pending
    pub async fn cancel(&self, id: &str) -> Result<PayoutIntent, StoreError> {
        let intent = self
            .store
            .transition(
                id,
                IntentStatus::Pending,
                IntentStatus::Cancelled,
                IntentPatch::default(),
            )
            .await?;
        info!("Intent {} cancelled while pending", id);
        Ok(intent)
    }

    /// Crash-recovery pass, run once at startup before the event loop.
    ///
    /// Pending intents never reached the bridge and are re-processed from the
    /// execute gate; Processing intents are handed to the reconciliation
    /// monitor, which resolves them from the bridge's authoritative state.
    pub async fn recover(&self) -> anyhow::Result<()> {
        let pending = self.store.find_by_status(IntentStatus::Pending).await?;
        let processing = self.store.find_by_status(IntentStatus::Processing).await?;
        if pending.is_empty() && processing.is_empty() {
            return Ok(());
        }
        info!(
            "Recovery: {} pending, {} in-flight intent(s) found",
            pending.len(),
            processing.len()
        );

        for intent in pending {
            if let Err(e) = self.process_intent(&intent.id).await {
                error!("Recovery of pending intent {} failed: {:#}", intent.id, e);
            }
        }
        for intent in processing {
            if let Err(e) = self.monitor.force_check(&intent.id).await {
                error!("Recovery check of intent {} failed: {:#}", intent.id, e);
            }
        }
        Ok(())
    }

    /// Read-only accessor for the status API.
    pub async fn intent(&self, id: &str) -> Result<Option<PayoutIntent>, StoreError> {
        self.store.get(id).await
    }

    /// Returns true if the settlement contract already marks this intent as
    /// processed. Operator diagnostic surface.
    pub async fn is_settled_on_chain(&self, id: &str) -> anyhow::Result<bool> {
        self.settlement.is_intent_processed(id).await
    }
}
