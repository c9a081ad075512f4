//! Reconciliation Monitor
//!
//! Background sweep over every intent currently Processing: polls the bridge
//! for each in-flight transfer and performs the same transition-and-confirm
//! sequence the orchestrator performs inline. This guarantees forward
//! progress when the orchestrator crashed between `execute()` and the
//! confirmation write-back.
//!
//! Sweep work is distributed across a bounded worker pool to avoid
//! overwhelming the bridge provider. Per-intent processing within one sweep
//! is serialized via a lightweight per-id lock; not required for correctness
//! (the write-back is idempotent) but it avoids wasted on-chain calls.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error, info, warn};

use crate::bridge::{BridgeGateway, BridgeTransferState};
use crate::chains::SettlementClient;
use crate::config::SolverConfig;
use crate::intent::{IntentStatus, PayoutIntent};
use crate::store::{IntentPatch, IntentStore, StoreError};

/// Snapshot of the monitor's observability surface.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStats {
    /// Whether the sweep loop is currently enabled
    pub monitoring: bool,
    /// Number of intents currently Processing (the in-flight set)
    pub in_flight: usize,
    /// Record counts keyed by status
    pub by_status: HashMap<String, usize>,
    /// Record counts keyed by destination chain
    pub by_destination: HashMap<String, usize>,
}

/// Periodic reconciliation sweep over in-flight intents.
pub struct ReconciliationMonitor {
    store: Arc<dyn IntentStore>,
    gateway: Arc<dyn BridgeGateway>,
    settlement: Arc<dyn SettlementClient>,
    /// Source chain name, used for bridge status queries
    source_chain: String,
    sweep_interval: Duration,
    /// Bounds concurrent status checks per sweep
    workers: Arc<Semaphore>,
    /// Sweep loop on/off switch (operator surface)
    enabled: AtomicBool,
    /// Per-intent-id locks serializing check work within the process
    id_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ReconciliationMonitor {
    /// Creates a new reconciliation monitor.
    ///
    /// # Arguments
    ///
    /// * `config` - Solver configuration (sweep interval, worker cap)
    /// * `store` - Shared intent store
    /// * `gateway` - Bridge provider gateway
    /// * `settlement` - Settlement chain client for confirmation write-backs
    pub fn new(
        config: &SolverConfig,
        store: Arc<dyn IntentStore>,
        gateway: Arc<dyn BridgeGateway>,
        settlement: Arc<dyn SettlementClient>,
    ) -> Self {
        Self {
            store,
            gateway,
            settlement,
            source_chain: config.source_chain.name.clone(),
            sweep_interval: Duration::from_secs(config.service.sweep_interval_secs),
            workers: Arc::new(Semaphore::new(config.service.sweep_worker_cap)),
            enabled: AtomicBool::new(true),
            id_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Enables the sweep loop.
    pub fn start(&self) {
        if !self.enabled.swap(true, Ordering::SeqCst) {
            info!("Reconciliation monitoring enabled");
        }
    }

    /// Disables the sweep loop. In-progress checks finish; no new sweep starts.
    pub fn stop(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            info!("Reconciliation monitoring disabled");
        }
    }

    /// Returns whether the sweep loop is enabled.
    pub fn is_monitoring(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Main sweep loop. Runs until the process stops.
    pub async fn run(self: Arc<Self>) {
        info!(
            "Reconciliation monitor started (interval {:?})",
            self.sweep_interval
        );
        loop {
            if self.is_monitoring() {
                Arc::clone(&self).sweep_once().await;
            }
            tokio::time::sleep(self.sweep_interval).await;
        }
    }

    /// Performs one sweep over all Processing intents.
    ///
    /// # Returns
    ///
    /// * `usize` - Number of intents checked this sweep
    pub async fn sweep_once(self: Arc<Self>) -> usize {
        let processing = match self.store.find_by_status(IntentStatus::Processing).await {
            Ok(list) => list,
            Err(e) => {
                error!("Sweep aborted, store query failed: {}", e);
                return 0;
            }
        };

        if processing.is_empty() {
            return 0;
        }
        debug!("Sweeping {} in-flight intent(s)", processing.len());

        let mut handles = Vec::with_capacity(processing.len());
        for intent in processing {
            let monitor = Arc::clone(&self);
            let permit = Arc::clone(&self.workers);
            handles.push(tokio::spawn(async move {
                // Bound concurrency against the bridge provider
                let _permit = match permit.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return,
                };
                if let Err(e) = monitor.check_intent(&intent.id).await {
                    error!("Reconciliation check failed for intent {}: {:#}", intent.id, e);
                }
            }));
        }

        let checked = handles.len();
        for handle in handles {
            let _ = handle.await;
        }

        // Drop locks no check is holding so the map tracks the in-flight
        // set instead of every id ever seen
        self.id_locks
            .lock()
            .await
            .retain(|_, lock| Arc::strong_count(lock) > 1);

        checked
    }

    /// Re-checks a single intent immediately, outside the sweep schedule.
    ///
    /// Used by the orchestrator right after a successful `execute()` and by
    /// operators through the status API.
    pub async fn force_check(&self, id: &str) -> anyhow::Result<()> {
        self.check_intent(id).await
    }

    /// Checks one Processing intent against the bridge and advances it on a
    /// terminal result.
    ///
    /// Intents that are no longer Processing by the time the check runs are
    /// skipped silently; losing that race is the expected outcome of running
    /// two writers against one CAS primitive.
    async fn check_intent(&self, id: &str) -> anyhow::Result<()> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let intent = match self.store.get(id).await? {
            Some(intent) if intent.status == IntentStatus::Processing => intent,
            _ => return Ok(()),
        };

        let bridge_tx = match &intent.bridge_source_tx_hash {
            Some(hash) => hash.clone(),
            None => {
                // Execute not yet recorded: either the orchestrator is mid-flight
                // or it crashed before submission. Nothing to poll yet.
                debug!("Intent {} has no bridge transaction yet, skipping check", id);
                return Ok(());
            }
        };

        let status = self
            .gateway
            .query_status(&bridge_tx, &self.source_chain, &intent.destination_chain)
            .await
            .map_err(|e| anyhow::anyhow!("status query for intent {}: {}", id, e))?;

        match status.state {
            BridgeTransferState::Pending => Ok(()),
            BridgeTransferState::Executed => {
                match status.target_tx_hash.filter(|h| !h.is_empty()) {
                    Some(target_tx) => self.confirm_and_complete(&intent, &target_tx).await,
                    None => {
                        // Provider lag: executed but the destination hash is
                        // not indexed yet. Re-check next sweep.
                        warn!(
                            "Bridge reports intent {} executed without a destination tx hash yet",
                            id
                        );
                        Ok(())
                    }
                }
            }
            BridgeTransferState::Failed => {
                warn!("Bridge reported transfer failed for intent {}", id);
                match self
                    .store
                    .transition(
                        id,
                        IntentStatus::Processing,
                        IntentStatus::Failed,
                        IntentPatch::failure("bridge transfer failed on the bridge network"),
                    )
                    .await
                {
                    Ok(_) => {
                        // Best-effort failure write-back; the contract's
                        // duplicate guard absorbs a repeat
                        if let Err(e) = self.settlement.confirm_payout(id, false, "").await {
                            error!("Failure write-back for intent {} not accepted: {:#}", id, e);
                        }
                        Ok(())
                    }
                    Err(StoreError::Conflict { .. }) => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Confirmation write-back followed by the local Completed transition.
    ///
    /// The settlement contract treats repeated confirmations for the same id
    /// as already-applied, so this sequence is safe to run from both the
    /// orchestrator and the monitor. The local record moves to Completed only
    /// after the write-back succeeds or is reported already applied.
    pub async fn confirm_and_complete(
        &self,
        intent: &PayoutIntent,
        target_tx_hash: &str,
    ) -> anyhow::Result<()> {
        self.settlement
            .confirm_payout(&intent.id, true, target_tx_hash)
            .await
            .map_err(|e| {
                // Escalated: the intent stays Processing for operator action
                anyhow::anyhow!(
                    "confirmation write-back failed for intent {} (chain {}, amount {}): {}",
                    intent.id,
                    intent.destination_chain,
                    intent.amount,
                    e
                )
            })?;

        match self
            .store
            .transition(
                &intent.id,
                IntentStatus::Processing,
                IntentStatus::Completed,
                IntentPatch::bridge_target(target_tx_hash),
            )
            .await
        {
            Ok(_) => {
                info!(
                    "Intent {} completed: {} {} delivered on {} (target tx {})",
                    intent.id, intent.amount, intent.token, intent.destination_chain, target_tx_hash
                );
                Ok(())
            }
            // Another writer finalized first; the record is already terminal
            Err(StoreError::Conflict { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Snapshot of counts by status and destination plus the in-flight size.
    pub async fn stats(&self) -> MonitorStats {
        let mut by_status = HashMap::new();
        let mut by_destination = HashMap::new();
        let mut in_flight = 0;

        for status in [
            IntentStatus::Pending,
            IntentStatus::Processing,
            IntentStatus::Completed,
            IntentStatus::Failed,
            IntentStatus::Cancelled,
        ] {
            let records = self.store.find_by_status(status).await.unwrap_or_default();
            if status == IntentStatus::Processing {
                in_flight = records.len();
            }
            by_status.insert(status.to_string(), records.len());
            for record in records {
                *by_destination.entry(record.destination_chain).or_insert(0) += 1;
            }
        }

        MonitorStats {
            monitoring: self.is_monitoring(),
            in_flight,
            by_status,
            by_destination,
        }
    }

    /// Returns the per-id lock, creating it on first use.
    async fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.id_locks.lock().await;
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
