//! Bridge Gateway
//!
//! Abstracts the cross-chain transfer provider behind a tagged-result trait so
//! the orchestrator and monitor can be driven by a deterministic fake in tests
//! without network access.
//!
//! `execute()` returns as soon as the transfer is submitted to the bridge
//! network; it does not imply funds have landed on the destination chain.
//! Callers must poll `query_status()` for a terminal result.
//!
//! All amount/fee arithmetic uses integer smallest-unit values; no
//! floating-point computation is permitted anywhere in this path.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::BridgeConfig;

/// Bridge provider errors.
///
/// `Unavailable` (including timeouts) is transient and retryable;
/// `UnsupportedRoute` and `InsufficientFee` are permanent and fail the intent
/// without retry.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Provider unreachable, timed out, or returned a transient failure
    #[error("bridge provider unavailable: {0}")]
    Unavailable(String),
    /// The requested chain/token route is not supported by the provider
    #[error("unsupported route: {source_chain} -> {dest_chain} for token {token}")]
    UnsupportedRoute {
        source_chain: String,
        dest_chain: String,
        token: String,
    },
    /// The attached fee is below what the provider requires
    #[error("insufficient bridge fee: required {required}, offered {offered}")]
    InsufficientFee { required: u128, offered: u128 },
}

impl BridgeError {
    /// Returns true if the error is transient and the call may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Unavailable(_))
    }
}

/// Provider-side state of a submitted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeTransferState {
    /// Submitted but not yet finalized on the destination chain
    Pending,
    /// Finalized on the destination chain
    Executed,
    /// Rejected or reverted by the bridge network
    Failed,
}

/// Result of a `query_status` call.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeStatus {
    /// Current transfer state
    pub state: BridgeTransferState,
    /// Destination-chain transaction hash, set once the transfer is executed
    pub target_tx_hash: Option<String>,
}

/// A cross-chain transfer request.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    /// Intent id, forwarded to the provider for traceability
    pub intent_id: String,
    /// Recipient address on the destination chain
    pub recipient: String,
    /// Source chain name
    pub source_chain: String,
    /// Destination chain name
    pub dest_chain: String,
    /// Token symbol
    pub token: String,
    /// Amount in smallest indivisible units
    pub amount: u128,
}

/// Cross-chain transfer provider seam.
///
/// Injected into the orchestrator and monitor at construction.
#[async_trait]
pub trait BridgeGateway: Send + Sync {
    /// Estimates the bridge fee for a transfer, in smallest units of `token`.
    async fn estimate_fee(
        &self,
        source_chain: &str,
        dest_chain: &str,
        amount: u128,
        token: &str,
    ) -> Result<u128, BridgeError>;

    /// Submits a transfer to the bridge network.
    ///
    /// Returns the source-side bridge transaction hash as soon as the
    /// transfer is accepted for processing.
    async fn execute(&self, request: &TransferRequest) -> Result<String, BridgeError>;

    /// Polls the provider for the state of a submitted transfer.
    async fn query_status(
        &self,
        bridge_tx_hash: &str,
        source_chain: &str,
        dest_chain: &str,
    ) -> Result<BridgeStatus, BridgeError>;
}

// ============================================================================
// HTTP PROVIDER CLIENT
// ============================================================================

/// Wire format for the provider's transfer submission endpoint.
#[derive(Debug, Serialize)]
struct SubmitTransferRequest<'a> {
    intent_id: &'a str,
    recipient: &'a str,
    source_chain: &'a str,
    dest_chain: &'a str,
    token: &'a str,
    /// Stringified to avoid JSON number precision limits
    amount: String,
}

/// Wire format for the provider's transfer submission response.
#[derive(Debug, Deserialize)]
struct SubmitTransferResponse {
    tx_hash: String,
}

/// Wire format for the provider's fee estimate response.
#[derive(Debug, Deserialize)]
struct FeeEstimateResponse {
    fee: String,
}

/// Provider error body, returned with 4xx statuses.
#[derive(Debug, Deserialize)]
struct ProviderError {
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    required_fee: Option<String>,
    #[serde(default)]
    offered_fee: Option<String>,
}

/// HTTP client for an Axelar-style bridge provider API.
///
/// Transport failures, timeouts and 5xx responses map to
/// [`BridgeError::Unavailable`]; 4xx responses carry a tagged error body that
/// maps to the permanent variants.
pub struct AxelarBridgeClient {
    client: Client,
    base_url: String,
}

impl AxelarBridgeClient {
    /// Creates a new bridge provider client.
    ///
    /// # Arguments
    ///
    /// * `config` - Bridge provider configuration (base URL, request timeout)
    ///
    /// # Returns
    ///
    /// * `Ok(AxelarBridgeClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create the HTTP client
    pub fn new(config: &BridgeConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create bridge HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Maps a 4xx provider error body to the tagged error taxonomy.
    fn classify_provider_error(
        err: ProviderError,
        source_chain: &str,
        dest_chain: &str,
        token: &str,
    ) -> BridgeError {
        match err.code.as_str() {
            "unsupported_route" | "unsupported_chain" | "unsupported_token" => {
                BridgeError::UnsupportedRoute {
                    source_chain: source_chain.to_string(),
                    dest_chain: dest_chain.to_string(),
                    token: token.to_string(),
                }
            }
            "insufficient_fee" => BridgeError::InsufficientFee {
                required: err
                    .required_fee
                    .and_then(|f| f.parse().ok())
                    .unwrap_or_default(),
                offered: err
                    .offered_fee
                    .and_then(|f| f.parse().ok())
                    .unwrap_or_default(),
            },
            other => BridgeError::Unavailable(format!(
                "provider rejected request: {} ({})",
                err.message, other
            )),
        }
    }
}

#[async_trait]
impl BridgeGateway for AxelarBridgeClient {
    async fn estimate_fee(
        &self,
        source_chain: &str,
        dest_chain: &str,
        amount: u128,
        token: &str,
    ) -> Result<u128, BridgeError> {
        let url = format!(
            "{}/fee?source={}&dest={}&token={}&amount={}",
            self.base_url, source_chain, dest_chain, token, amount
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::Unavailable(format!("fee estimate request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let body: FeeEstimateResponse = response.json().await.map_err(|e| {
                BridgeError::Unavailable(format!("invalid fee estimate response: {}", e))
            })?;
            return body
                .fee
                .parse()
                .map_err(|_| BridgeError::Unavailable("non-integer fee in response".to_string()));
        }

        if status.is_client_error() {
            // Providers without a quote endpoint get the 0.1% default
            if status == reqwest::StatusCode::NOT_FOUND {
                let fallback = amount / 1000;
                debug!(
                    "Provider has no fee endpoint, using default estimate {} for {} -> {}",
                    fallback, source_chain, dest_chain
                );
                return Ok(fallback);
            }
            let err: ProviderError = response.json().await.map_err(|e| {
                BridgeError::Unavailable(format!("invalid provider error body: {}", e))
            })?;
            return Err(Self::classify_provider_error(
                err,
                source_chain,
                dest_chain,
                token,
            ));
        }

        Err(BridgeError::Unavailable(format!(
            "fee estimate returned status {}",
            status
        )))
    }

    async fn execute(&self, request: &TransferRequest) -> Result<String, BridgeError> {
        let url = format!("{}/transfers", self.base_url);
        let body = SubmitTransferRequest {
            intent_id: &request.intent_id,
            recipient: &request.recipient,
            source_chain: &request.source_chain,
            dest_chain: &request.dest_chain,
            token: &request.token,
            amount: request.amount.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BridgeError::Unavailable(format!("transfer submission failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let body: SubmitTransferResponse = response.json().await.map_err(|e| {
                BridgeError::Unavailable(format!("invalid transfer response: {}", e))
            })?;
            info!(
                "Bridge transfer submitted for intent {}: tx_hash={}",
                request.intent_id, body.tx_hash
            );
            return Ok(body.tx_hash);
        }

        if status.is_client_error() {
            let err: ProviderError = response.json().await.map_err(|e| {
                BridgeError::Unavailable(format!("invalid provider error body: {}", e))
            })?;
            return Err(Self::classify_provider_error(
                err,
                &request.source_chain,
                &request.dest_chain,
                &request.token,
            ));
        }

        Err(BridgeError::Unavailable(format!(
            "transfer submission returned status {}",
            status
        )))
    }

    async fn query_status(
        &self,
        bridge_tx_hash: &str,
        source_chain: &str,
        dest_chain: &str,
    ) -> Result<BridgeStatus, BridgeError> {
        let url = format!(
            "{}/transfers/{}?source={}&dest={}",
            self.base_url, bridge_tx_hash, source_chain, dest_chain
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::Unavailable(format!("status query failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                BridgeError::Unavailable(format!("invalid status response: {}", e))
            });
        }

        Err(BridgeError::Unavailable(format!(
            "status query for {} returned status {}",
            bridge_tx_hash, status
        )))
    }
}
