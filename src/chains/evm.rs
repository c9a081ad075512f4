//! EVM Settlement Chain Client
//!
//! JSON-RPC client for the settlement contract on an EVM source chain:
//! queries `IntentCreated` / `IntentCompleted` logs via `eth_getLogs` and
//! submits `confirmPayout` transactions through the solver's signer RPC.
//!
//! The confirmation path preflights the call with `eth_call` so that a
//! contract-side "already processed" guard is detected before a transaction
//! is spent on it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethereum_types::U256;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Confirmation, IntentCompletedEvent, IntentCreatedEvent, SettlementClient};
use crate::config::SourceChainConfig;

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// EVM event log entry
#[derive(Debug, Clone, Deserialize)]
struct EvmLog {
    /// Array of topics (indexed event parameters)
    pub topics: Vec<String>,
    /// Event data (non-indexed parameters)
    pub data: String,
    /// Block number
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    /// Transaction hash
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
}

/// Client for the settlement contract on an EVM chain.
pub struct EvmSettlementClient {
    /// HTTP client for JSON-RPC calls
    client: Client,
    /// RPC endpoint URL (the node also holds the solver signing credential)
    rpc_url: String,
    /// Settlement contract address
    contract_addr: String,
    /// Solver account address used as `from` for write-backs
    solver_addr: String,
}

impl EvmSettlementClient {
    /// Creates a new settlement chain client.
    ///
    /// # Arguments
    ///
    /// * `config` - Source chain configuration
    ///
    /// # Returns
    ///
    /// * `Ok(EvmSettlementClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create the HTTP client
    pub fn new(config: &SourceChainConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("Failed to create settlement RPC client")?;

        Ok(Self {
            client,
            rpc_url: config.rpc_url.clone(),
            contract_addr: config.contract_address.clone(),
            solver_addr: config.solver_address.clone(),
        })
    }

    /// Sends a JSON-RPC request and unwraps the result.
    async fn rpc<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(error) = response.error {
            anyhow::bail!("JSON-RPC error from {}: {} ({})", method, error.message, error.code);
        }
        response
            .result
            .ok_or_else(|| anyhow::anyhow!("Empty result from {}", method))
    }

    /// Like `rpc`, but surfaces the raw JSON-RPC error for revert
    /// classification instead of flattening it into the anyhow chain.
    async fn rpc_raw(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<std::result::Result<serde_json::Value, String>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let response: JsonRpcResponse<serde_json::Value> = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(error) = response.error {
            return Ok(Err(error.message));
        }
        Ok(Ok(response.result.unwrap_or(serde_json::Value::Null)))
    }

    /// Fetches logs for one event topic over an inclusive block range.
    async fn get_logs(&self, topic0: &str, from_block: u64, to_block: u64) -> Result<Vec<EvmLog>> {
        let filter = serde_json::json!({
            "address": self.contract_addr,
            "topics": [topic0],
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
        });

        debug!(
            "eth_getLogs contract={} topic={} blocks={}..{}",
            self.contract_addr, topic0, from_block, to_block
        );
        self.rpc("eth_getLogs", vec![filter]).await
    }

    /// Builds the `confirmPayout(uint256,bool,string)` calldata.
    fn confirm_payout_calldata(&self, id: &str, success: bool, tx_hash: &str) -> Result<String> {
        let selector = &keccak_hash("confirmPayout(uint256,bool,string)")[..8];
        let id_word = encode_u256_dec(id)?;
        let success_word = format!("{:0>64}", if success { "1" } else { "0" });
        // Head: id, success, offset of the string tail (3 words = 0x60)
        let offset_word = format!("{:0>64x}", 96);
        let tail = encode_abi_string(tx_hash);
        Ok(format!(
            "0x{}{}{}{}{}",
            selector, id_word, success_word, offset_word, tail
        ))
    }
}

#[async_trait]
impl SettlementClient for EvmSettlementClient {
    async fn latest_block(&self) -> Result<u64> {
        let block_hex: String = self.rpc("eth_blockNumber", vec![]).await?;
        parse_hex_u64(&block_hex).context("Failed to parse block number")
    }

    async fn intent_created_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<IntentCreatedEvent>> {
        // IntentCreated(uint256 indexed id, address indexed winner, string targetChain,
        //               uint256 amount, string token, uint256 timestamp)
        let topic = format!(
            "0x{}",
            keccak_hash("IntentCreated(uint256,address,string,uint256,string,uint256)")
        );
        let logs = self.get_logs(&topic, from_block, to_block).await?;

        let mut events = Vec::new();
        for log in logs {
            // topics[1] = id (uint256), topics[2] = winner (address, left-padded)
            if log.topics.len() < 3 {
                warn!("Skipping IntentCreated log with {} topics", log.topics.len());
                continue;
            }
            let id = decode_topic_u256(&log.topics[1]).to_string();
            let winner = decode_topic_address(&log.topics[2]);

            // data = abi.encode(targetChain, amount, token, timestamp):
            // [offset_chain][amount][offset_token][timestamp][chain tail][token tail]
            let data = log.data.strip_prefix("0x").unwrap_or(&log.data);
            let amount_word = match read_word(data, 1) {
                Some(w) => w,
                None => {
                    warn!("Skipping IntentCreated log for id {} with short data", id);
                    continue;
                }
            };
            let amount = match u128_from_word(&amount_word) {
                Some(a) => a,
                None => {
                    warn!("Skipping IntentCreated log for id {}: amount exceeds u128", id);
                    continue;
                }
            };
            let timestamp_word = read_word(data, 3).unwrap_or_default();
            let timestamp = u128_from_word(&timestamp_word).unwrap_or(0) as u64;

            let target_chain = match decode_abi_string_at(data, 0) {
                Some(s) => s,
                None => {
                    warn!("Skipping IntentCreated log for id {}: bad targetChain encoding", id);
                    continue;
                }
            };
            let token = match decode_abi_string_at(data, 2) {
                Some(s) => s,
                None => {
                    warn!("Skipping IntentCreated log for id {}: bad token encoding", id);
                    continue;
                }
            };

            events.push(IntentCreatedEvent {
                id,
                winner,
                target_chain,
                amount,
                token,
                timestamp,
                tx_hash: log.transaction_hash,
                block_number: parse_hex_u64(&log.block_number).unwrap_or(0),
            });
        }

        Ok(events)
    }

    async fn intent_completed_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<IntentCompletedEvent>> {
        // IntentCompleted(uint256 indexed id, bool success, string txHash, uint256 timestamp)
        let topic = format!(
            "0x{}",
            keccak_hash("IntentCompleted(uint256,bool,string,uint256)")
        );
        let logs = self.get_logs(&topic, from_block, to_block).await?;

        let mut events = Vec::new();
        for log in logs {
            if log.topics.len() < 2 {
                continue;
            }
            let id = decode_topic_u256(&log.topics[1]).to_string();

            // data = abi.encode(success, txHash, timestamp):
            // [success][offset_txhash][timestamp][txhash tail]
            let data = log.data.strip_prefix("0x").unwrap_or(&log.data);
            let success = read_word(data, 0)
                .and_then(|w| u128_from_word(&w))
                .map(|v| v != 0)
                .unwrap_or(false);
            let tx_hash = match decode_abi_string_at(data, 1) {
                Some(s) => s,
                None => {
                    warn!("Skipping IntentCompleted log for id {}: bad txHash encoding", id);
                    continue;
                }
            };
            let timestamp = read_word(data, 2)
                .and_then(|w| u128_from_word(&w))
                .unwrap_or(0) as u64;

            events.push(IntentCompletedEvent {
                id,
                success,
                tx_hash,
                timestamp,
                block_number: parse_hex_u64(&log.block_number).unwrap_or(0),
            });
        }

        Ok(events)
    }

    async fn is_intent_processed(&self, id: &str) -> Result<bool> {
        let selector = &keccak_hash("isIntentProcessed(uint256)")[..8];
        let calldata = format!("0x{}{}", selector, encode_u256_dec(id)?);
        let call = serde_json::json!({
            "to": self.contract_addr,
            "data": calldata,
        });

        let result: String = self
            .rpc("eth_call", vec![call, serde_json::json!("latest")])
            .await?;
        let data = result.strip_prefix("0x").unwrap_or(&result);
        Ok(read_word(data, 0)
            .and_then(|w| u128_from_word(&w))
            .map(|v| v != 0)
            .unwrap_or(false))
    }

    async fn confirm_payout(&self, id: &str, success: bool, tx_hash: &str) -> Result<Confirmation> {
        // Cheap guard check first: a confirmation that already landed (ours or
        // the monitor's) must not cost another transaction.
        if self.is_intent_processed(id).await.unwrap_or(false) {
            info!("Intent {} already confirmed on-chain, skipping write-back", id);
            return Ok(Confirmation::AlreadyProcessed);
        }

        let calldata = self.confirm_payout_calldata(id, success, tx_hash)?;
        let tx = serde_json::json!({
            "from": self.solver_addr,
            "to": self.contract_addr,
            "data": calldata,
        });

        // Preflight: surfaces contract reverts without spending a transaction.
        match self
            .rpc_raw("eth_call", vec![tx.clone(), serde_json::json!("latest")])
            .await?
        {
            Ok(_) => {}
            Err(message) => {
                if is_already_processed_revert(&message) {
                    info!("Intent {} reported already processed by contract", id);
                    return Ok(Confirmation::AlreadyProcessed);
                }
                anyhow::bail!("confirmPayout reverted for intent {}: {}", id, message);
            }
        }

        match self.rpc_raw("eth_sendTransaction", vec![tx]).await? {
            Ok(serde_json::Value::String(hash)) => {
                info!("Confirmation submitted for intent {}: tx={}", id, hash);
                Ok(Confirmation::Submitted(hash))
            }
            Ok(other) => anyhow::bail!(
                "Unexpected eth_sendTransaction result for intent {}: {}",
                id,
                other
            ),
            Err(message) => {
                if is_already_processed_revert(&message) {
                    return Ok(Confirmation::AlreadyProcessed);
                }
                anyhow::bail!("confirmPayout send failed for intent {}: {}", id, message);
            }
        }
    }
}

// ============================================================================
// ABI HELPERS
// ============================================================================

/// Keccak-256 of an ASCII signature, hex encoded without prefix.
fn keccak_hash(signature: &str) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(signature.as_bytes());
    hex::encode(hasher.finalize())
}

/// Parses a 0x-prefixed hex quantity into u64.
fn parse_hex_u64(value: &str) -> Result<u64> {
    u64::from_str_radix(value.strip_prefix("0x").unwrap_or(value), 16)
        .with_context(|| format!("Invalid hex quantity: {}", value))
}

/// Decodes a 32-byte topic as a U256.
fn decode_topic_u256(topic: &str) -> U256 {
    let stripped = topic.strip_prefix("0x").unwrap_or(topic);
    U256::from_str_radix(stripped, 16).unwrap_or_default()
}

/// Decodes a left-padded address topic into a 0x-prefixed 20-byte address.
fn decode_topic_address(topic: &str) -> String {
    let stripped = topic.strip_prefix("0x").unwrap_or(topic);
    if stripped.len() >= 40 {
        format!("0x{}", &stripped[stripped.len() - 40..])
    } else {
        format!("0x{:0>40}", stripped)
    }
}

/// Returns the `index`-th 32-byte word of ABI data as a hex string.
fn read_word(data: &str, index: usize) -> Option<String> {
    let start = index * 64;
    let end = start + 64;
    if data.len() < end {
        return None;
    }
    Some(data[start..end].to_string())
}

/// Parses a 32-byte hex word into u128, rejecting values that overflow.
fn u128_from_word(word: &str) -> Option<u128> {
    let value = U256::from_str_radix(word, 16).ok()?;
    if value > U256::from(u128::MAX) {
        return None;
    }
    Some(value.as_u128())
}

/// Decodes a dynamic ABI string whose offset word sits at `head_index`.
fn decode_abi_string_at(data: &str, head_index: usize) -> Option<String> {
    let offset_word = read_word(data, head_index)?;
    let offset = u128_from_word(&offset_word)? as usize;
    // Offsets are byte offsets into the data section; 2 hex chars per byte
    let len_start = offset * 2;
    if data.len() < len_start + 64 {
        return None;
    }
    let len = u128_from_word(&data[len_start..len_start + 64])? as usize;
    let bytes_start = len_start + 64;
    if data.len() < bytes_start + len * 2 {
        return None;
    }
    let raw = hex::decode(&data[bytes_start..bytes_start + len * 2]).ok()?;
    String::from_utf8(raw).ok()
}

/// Encodes a decimal id string as a 32-byte ABI word.
fn encode_u256_dec(value: &str) -> Result<String> {
    let parsed =
        U256::from_dec_str(value).with_context(|| format!("Invalid intent id: {}", value))?;
    let mut bytes = [0u8; 32];
    parsed.to_big_endian(&mut bytes);
    Ok(hex::encode(bytes))
}

/// Encodes a string as ABI tail: length word followed by right-padded bytes.
fn encode_abi_string(value: &str) -> String {
    let bytes = value.as_bytes();
    let len_word = format!("{:0>64x}", bytes.len());
    let mut padded = hex::encode(bytes);
    while padded.len() % 64 != 0 {
        padded.push('0');
    }
    format!("{}{}", len_word, padded)
}

/// Matches the settlement contract's duplicate-confirmation guard revert.
fn is_already_processed_revert(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("already processed") || lower.contains("already confirmed")
}
