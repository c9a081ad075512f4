//! Chain Event Source
//!
//! Maintains a checkpointed subscription to intent-created and
//! intent-completed events from the settlement contract and delivers decoded,
//! validated events to a single registered consumer over a channel.
//!
//! Delivery is at-least-once: after a crash or transport error the next poll
//! re-reads from the last durably processed block, so downstream consumers
//! must tolerate duplicates (the store's compare-and-swap absorbs them).
//! Provider errors mark the source degraded but never terminate the process.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::chains::{IntentCompletedEvent, IntentCreatedEvent, SettlementClient};
use crate::config::SolverConfig;

/// A decoded settlement-contract event delivered to the consumer.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// A payout intent was created on the source chain
    IntentCreated(IntentCreatedEvent),
    /// The settlement contract recorded a payout completion
    IntentCompleted(IntentCompletedEvent),
}

/// Checkpointed event source for the settlement contract.
///
/// The consumer side of the channel is handed out once at construction; the
/// source itself holds no intent state.
pub struct ChainEventSource {
    client: Arc<dyn SettlementClient>,
    /// Next block to read from (last durably processed block + 1)
    next_block: AtomicU64,
    /// Set while the provider is erroring; cleared on the next good poll
    degraded: AtomicBool,
    poll_interval: Duration,
    sender: mpsc::Sender<ChainEvent>,
}

impl ChainEventSource {
    /// Creates an event source starting at the configured checkpoint block.
    ///
    /// # Arguments
    ///
    /// * `client` - Settlement chain client
    /// * `config` - Solver configuration (checkpoint block, poll interval)
    ///
    /// # Returns
    ///
    /// * `(ChainEventSource, Receiver)` - The source and its single consumer end
    pub fn new(
        client: Arc<dyn SettlementClient>,
        config: &SolverConfig,
    ) -> (Self, mpsc::Receiver<ChainEvent>) {
        let (sender, receiver) = mpsc::channel(256);
        let source = Self {
            client,
            next_block: AtomicU64::new(config.source_chain.from_block),
            degraded: AtomicBool::new(false),
            poll_interval: Duration::from_millis(config.service.listener_poll_interval_ms),
            sender,
        };
        (source, receiver)
    }

    /// Returns the next block the source will read from.
    pub fn checkpoint(&self) -> u64 {
        self.next_block.load(Ordering::SeqCst)
    }

    /// Returns true while the settlement provider is erroring.
    ///
    /// Degraded-health signal for operators; the poll loop keeps retrying
    /// regardless.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Polls one block range and delivers decoded events.
    ///
    /// The checkpoint only advances after every event of the range has been
    /// handed to the channel, so an interrupted poll is re-read in full on
    /// the next tick.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of events delivered
    /// * `Err(anyhow::Error)` - Provider failure; checkpoint unchanged
    pub async fn poll_once(&self) -> anyhow::Result<usize> {
        let from_block = self.next_block.load(Ordering::SeqCst);
        let latest = self.client.latest_block().await?;
        if latest < from_block {
            return Ok(0);
        }

        let created = self.client.intent_created_logs(from_block, latest).await?;
        let completed = self.client.intent_completed_logs(from_block, latest).await?;

        let mut delivered = 0;
        for event in created {
            if let Some(reason) = invalid_created_field(&event) {
                warn!(
                    "Dropping malformed IntentCreated event (id={}, block={}): {}",
                    event.id, event.block_number, reason
                );
                continue;
            }
            if self
                .sender
                .send(ChainEvent::IntentCreated(event))
                .await
                .is_err()
            {
                anyhow::bail!("Event consumer dropped");
            }
            delivered += 1;
        }

        for event in completed {
            if self
                .sender
                .send(ChainEvent::IntentCompleted(event))
                .await
                .is_err()
            {
                anyhow::bail!("Event consumer dropped");
            }
            delivered += 1;
        }

        self.next_block.store(latest + 1, Ordering::SeqCst);
        if delivered > 0 {
            debug!(
                "Delivered {} event(s) from blocks {}..{}",
                delivered, from_block, latest
            );
        }
        Ok(delivered)
    }

    /// Main subscription loop.
    ///
    /// Runs until the consumer is dropped. Transport and provider errors are
    /// logged, flagged via `is_degraded()`, and retried from the unchanged
    /// checkpoint on the next tick.
    pub async fn run(&self) {
        info!(
            "Event source started (checkpoint block {}, poll interval {:?})",
            self.checkpoint(),
            self.poll_interval
        );

        loop {
            match self.poll_once().await {
                Ok(_) => {
                    if self.degraded.swap(false, Ordering::SeqCst) {
                        info!("Settlement provider recovered, resuming from block {}", self.checkpoint());
                    }
                }
                Err(e) => {
                    if self.sender.is_closed() {
                        info!("Event consumer gone, stopping event source");
                        return;
                    }
                    if !self.degraded.swap(true, Ordering::SeqCst) {
                        error!("Settlement provider error, source degraded: {:#}", e);
                    }
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Field-level validation applied before delivery.
///
/// Returns the drop reason for malformed events, None for deliverable ones.
fn invalid_created_field(event: &IntentCreatedEvent) -> Option<&'static str> {
    if event.id.is_empty() {
        return Some("empty id");
    }
    if event.winner.is_empty() {
        return Some("empty winner address");
    }
    let stripped = event.winner.strip_prefix("0x").unwrap_or(&event.winner);
    if !stripped.is_empty() && stripped.chars().all(|c| c == '0') {
        return Some("zero winner address");
    }
    if event.amount == 0 {
        return Some("non-positive amount");
    }
    if event.target_chain.is_empty() {
        return Some("empty target chain");
    }
    None
}
