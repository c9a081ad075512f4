//! Configuration Management Module
//!
//! This module handles loading and managing configuration for the payout
//! solver service. Configuration includes the source-chain connection, the
//! bridge provider, retry/backoff bounds, and the supported destination
//! chain/token table.

use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all solver service settings.
///
/// This structure holds configuration for:
/// - Service-level loops (poll intervals, sweep interval, worker cap, status API)
/// - Source chain connection (settlement contract, solver account)
/// - Bridge provider connection
/// - Retry/backoff bounds for transient bridge failures
/// - Supported destination chains with their token tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Service configuration (intervals, worker cap, status API binding)
    pub service: ServiceConfig,
    /// Source chain configuration (where intents are created and confirmed)
    pub source_chain: SourceChainConfig,
    /// Bridge provider configuration
    pub bridge: BridgeConfig,
    /// Retry/backoff configuration for transient bridge errors
    #[serde(default)]
    pub retry: RetryConfig,
    /// Supported destination chains (use [[destination_chain]] in TOML)
    #[serde(rename = "destination_chain", default)]
    pub destination_chains: Vec<DestinationChainConfig>,
}

/// Service-level configuration for the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Polling interval for source-chain log batches in milliseconds
    #[serde(default = "default_listener_poll_interval_ms")]
    pub listener_poll_interval_ms: u64,
    /// Reconciliation sweep interval in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Maximum concurrent status checks per sweep
    #[serde(default = "default_sweep_worker_cap")]
    pub sweep_worker_cap: usize,
    /// Operator status API host
    #[serde(default = "default_status_api_host")]
    pub status_api_host: String,
    /// Operator status API port
    #[serde(default = "default_status_api_port")]
    pub status_api_port: u16,
}

/// Configuration for the source (settlement) chain connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceChainConfig {
    /// Human-readable name for the chain
    pub name: String,
    /// RPC endpoint URL; the node holds the solver signing credential
    pub rpc_url: String,
    /// Unique chain identifier
    pub chain_id: u64,
    /// Address of the settlement contract
    pub contract_address: String,
    /// Solver account address used for confirmation write-backs
    pub solver_address: String,
    /// Checkpoint block to start event processing from
    #[serde(default)]
    pub from_block: u64,
    /// Per-call RPC timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Configuration for the bridge provider connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Bridge provider API base URL
    pub api_url: String,
    /// Provider environment label ("testnet" or "mainnet")
    #[serde(default = "default_bridge_environment")]
    pub environment: String,
    /// Per-call request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Retry/backoff bounds for transient bridge failures.
///
/// Delays grow as `base_delay_ms * backoff_factor^attempt`, capped by
/// `max_retries` attempts. Integer arithmetic only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum execute attempts before the intent is failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Multiplicative backoff factor
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

/// A supported destination chain and the tokens deliverable on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationChainConfig {
    /// Chain name as it appears in intent-created events
    pub name: String,
    /// Token symbols the solver will deliver on this chain
    #[serde(default)]
    pub tokens: Vec<String>,
}

fn default_listener_poll_interval_ms() -> u64 {
    5000
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_sweep_worker_cap() -> usize {
    8
}

fn default_status_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_status_api_port() -> u16 {
    4455
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_bridge_environment() -> String {
    "testnet".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    5000
}

fn default_backoff_factor() -> u64 {
    2
}

impl SolverConfig {
    /// Loads configuration from a TOML file.
    ///
    /// This function:
    /// 1. Checks if config/solver.toml exists (or uses SOLVER_CONFIG_PATH env var or provided path)
    /// 2. If it exists, loads and parses the configuration
    /// 3. Validates the configuration
    /// 4. If it doesn't exist, returns an error asking user to copy template
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to config file. If None, uses SOLVER_CONFIG_PATH env var or default.
    ///
    /// # Returns
    ///
    /// * `Ok(SolverConfig)` - Successfully loaded and validated configuration
    /// * `Err(anyhow::Error)` - Failed to load configuration, file doesn't exist, or validation failed
    pub fn load_from_path(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("SOLVER_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/solver.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: SolverConfig = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/solver.template.toml config/solver.toml\n\
                Then edit config/solver.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Loads configuration from a TOML file (convenience method that uses default path).
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path(None)
    }

    /// Returns true if the chain is in the configured supported set.
    pub fn supports_chain(&self, chain: &str) -> bool {
        self.destination_chains.iter().any(|c| c.name == chain)
    }

    /// Returns true if the token is deliverable on the given chain.
    pub fn supports_token(&self, chain: &str, token: &str) -> bool {
        self.destination_chains
            .iter()
            .find(|c| c.name == chain)
            .map(|c| c.tokens.iter().any(|t| t == token))
            .unwrap_or(false)
    }

    /// Returns the tokens deliverable on a chain, empty if unsupported.
    pub fn supported_tokens(&self, chain: &str) -> &[String] {
        self.destination_chains
            .iter()
            .find(|c| c.name == chain)
            .map(|c| c.tokens.as_slice())
            .unwrap_or(&[])
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks:
    /// - At least one destination chain is configured
    /// - Destination chain names are unique and none shadows the source chain
    /// - Every destination chain lists at least one token
    /// - Retry bounds and service intervals are sane
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Configuration is valid
    /// * `Err(anyhow::Error)` - Validation failed with error message
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.destination_chains.is_empty() {
            return Err(anyhow::anyhow!(
                "Configuration error: At least one [[destination_chain]] must be configured"
            ));
        }

        for i in 0..self.destination_chains.len() {
            if self.destination_chains[i].name == self.source_chain.name {
                return Err(anyhow::anyhow!(
                    "Configuration error: Destination chain '{}' has the same name as the source chain",
                    self.destination_chains[i].name
                ));
            }
            for j in (i + 1)..self.destination_chains.len() {
                if self.destination_chains[i].name == self.destination_chains[j].name {
                    return Err(anyhow::anyhow!(
                        "Configuration error: Destination chain '{}' is configured twice",
                        self.destination_chains[i].name
                    ));
                }
            }
        }

        for chain in &self.destination_chains {
            if chain.tokens.is_empty() {
                return Err(anyhow::anyhow!(
                    "Configuration error: Destination chain '{}' lists no tokens",
                    chain.name
                ));
            }
        }

        if self.retry.backoff_factor == 0 {
            return Err(anyhow::anyhow!(
                "Configuration error: retry.backoff_factor must be at least 1"
            ));
        }
        if self.service.sweep_interval_secs == 0 {
            return Err(anyhow::anyhow!(
                "Configuration error: service.sweep_interval_secs must be positive"
            ));
        }
        if self.service.sweep_worker_cap == 0 {
            return Err(anyhow::anyhow!(
                "Configuration error: service.sweep_worker_cap must be at least 1"
            ));
        }
        if self.service.listener_poll_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "Configuration error: service.listener_poll_interval_ms must be positive"
            ));
        }

        Ok(())
    }
}
