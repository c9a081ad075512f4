//! Intent Store
//!
//! Durable, race-safe storage seam for payout intent records. The store is the
//! only shared mutable resource in the solver core: every writer (orchestrator,
//! reconciliation monitor, crash-recovery path) goes through the same
//! conditional-transition primitive, which converts at-least-once event
//! delivery and concurrent sweeps into effectively-once state progress.
//!
//! Blind overwrites are forbidden by contract: there is no `put`, only
//! `create` (create-once) and `transition` (compare-and-swap on the expected
//! status).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::intent::{unix_now, IntentStatus, PayoutIntent};

/// Errors from store operations.
///
/// `Conflict` is an expected outcome of optimistic-concurrency races, not an
/// alarm condition; callers absorb it by re-reading current state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this id already exists (create-once violation)
    #[error("intent {0} already exists")]
    AlreadyExists(String),
    /// Current status did not match the expected status of the transition
    #[error("intent {id}: expected status {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: IntentStatus,
        actual: IntentStatus,
    },
    /// No record exists for this id
    #[error("intent {0} not found")]
    NotFound(String),
    /// Backend failure (I/O, serialization) for durable implementations
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Fields a transition may update alongside the status write.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct IntentPatch {
    pub bridge_source_tx_hash: Option<String>,
    pub bridge_target_tx_hash: Option<String>,
    pub failure_reason: Option<String>,
}

impl IntentPatch {
    /// Patch recording the bridge source-side transaction.
    pub fn bridge_source(tx_hash: impl Into<String>) -> Self {
        Self {
            bridge_source_tx_hash: Some(tx_hash.into()),
            ..Default::default()
        }
    }

    /// Patch recording the bridge destination-side transaction.
    pub fn bridge_target(tx_hash: impl Into<String>) -> Self {
        Self {
            bridge_target_tx_hash: Some(tx_hash.into()),
            ..Default::default()
        }
    }

    /// Patch recording a failure reason.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            failure_reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// Storage seam for payout intents.
///
/// Implementations must guarantee that `create` is create-once per id and
/// that `transition` is atomic with respect to concurrent transitions on the
/// same id.
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Creates a new record. Fails with `AlreadyExists` if the id is taken.
    async fn create(&self, intent: PayoutIntent) -> Result<(), StoreError>;

    /// Conditionally advances a record's status.
    ///
    /// Fails with `Conflict` if the current status is not `expected`, or if
    /// the `expected -> new` edge is not in the transition DAG (which keeps
    /// terminal records append-only no matter what the caller claims to
    /// expect). On success returns the updated record.
    async fn transition(
        &self,
        id: &str,
        expected: IntentStatus,
        new: IntentStatus,
        patch: IntentPatch,
    ) -> Result<PayoutIntent, StoreError>;

    /// Returns all records currently in the given status.
    async fn find_by_status(&self, status: IntentStatus) -> Result<Vec<PayoutIntent>, StoreError>;

    /// Returns a record by id, if present. Read-only accessor for the status
    /// API and tests.
    async fn get(&self, id: &str) -> Result<Option<PayoutIntent>, StoreError>;
}

/// In-memory intent store.
///
/// Atomicity comes from holding the write lock across the read-check-write of
/// each operation. Suitable for a single active solver process; a durable
/// backend can replace it behind the same trait.
pub struct MemoryIntentStore {
    intents: Arc<RwLock<HashMap<String, PayoutIntent>>>,
}

impl MemoryIntentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            intents: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryIntentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntentStore for MemoryIntentStore {
    async fn create(&self, intent: PayoutIntent) -> Result<(), StoreError> {
        let mut intents = self.intents.write().await;
        if intents.contains_key(&intent.id) {
            return Err(StoreError::AlreadyExists(intent.id));
        }
        intents.insert(intent.id.clone(), intent);
        Ok(())
    }

    async fn transition(
        &self,
        id: &str,
        expected: IntentStatus,
        new: IntentStatus,
        patch: IntentPatch,
    ) -> Result<PayoutIntent, StoreError> {
        let mut intents = self.intents.write().await;
        let record = intents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if record.status != expected {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected,
                actual: record.status,
            });
        }
        if !expected.can_transition_to(new) {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected,
                actual: record.status,
            });
        }

        record.status = new;
        record.updated_at = unix_now();
        if let Some(hash) = patch.bridge_source_tx_hash {
            record.bridge_source_tx_hash = Some(hash);
        }
        if let Some(hash) = patch.bridge_target_tx_hash {
            record.bridge_target_tx_hash = Some(hash);
        }
        if let Some(reason) = patch.failure_reason {
            record.failure_reason = Some(reason);
        }

        Ok(record.clone())
    }

    async fn find_by_status(&self, status: IntentStatus) -> Result<Vec<PayoutIntent>, StoreError> {
        let intents = self.intents.read().await;
        Ok(intents
            .values()
            .filter(|i| i.status == status)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<PayoutIntent>, StoreError> {
        let intents = self.intents.read().await;
        Ok(intents.get(id).cloned())
    }
}
