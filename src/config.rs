//! Configuration module for the swap engine
//!
//! This module handles configuration loading from TOML files, `.env` files
//! and environment variable overrides, and validates the result before the
//! engine is built. The loaded `Config` is immutable for the engine's lifetime.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::retry::RetryPolicy;
use crate::types::{DEFAULT_MAX_PRICE_IMPACT, DEFAULT_SLIPPAGE};

/// Environment variable overriding `rpc.url`
pub const ENV_RPC_URL: &str = "SWAP_RPC_URL";
/// Environment variable overriding `oracle.price_api_url`
pub const ENV_PRICE_API_URL: &str = "SWAP_PRICE_API_URL";
/// Environment variable overriding `contract.address`
pub const ENV_CONTRACT_ADDRESS: &str = "SWAP_CONTRACT_ADDRESS";
/// Environment variable overriding `wallet.keypair_path`
pub const ENV_KEYPAIR_PATH: &str = "SWAP_KEYPAIR_PATH";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chain RPC endpoint
    pub rpc: RpcConfig,

    /// Price source
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Swap contract and fee limits
    pub contract: ContractConfig,

    /// Default risk limits applied to requests
    #[serde(default)]
    pub trading: TradingConfig,

    /// Confirmation and retry behavior
    #[serde(default)]
    pub engine: EngineConfig,

    /// Wallet configuration
    pub wallet: WalletConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL
    pub url: String,

    /// Timeout applied to each RPC call, in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Price API base URL
    #[serde(default = "default_price_api_url")]
    pub price_api_url: String,

    /// Timeout for one quote request, in seconds
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Address of the swap contract
    pub address: String,

    /// Gas limit attached to every swap call
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    /// Refuse to build when the network gas price exceeds this
    #[serde(default)]
    pub max_gas_price: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Default slippage tolerance as a fraction (0.01 = 1%)
    #[serde(default = "default_slippage")]
    pub default_slippage: f64,

    /// Default price impact ceiling as a fraction
    #[serde(default = "default_max_price_impact")]
    pub max_price_impact: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long to wait for a terminal status after broadcast, in seconds
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    /// Status poll interval in milliseconds, clamped to [50, 5000]
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Retry policy for the quote step; single attempt unless configured
    #[serde(default)]
    pub quote_retry: RetryPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
}

// Default value functions
fn default_rpc_timeout() -> u64 { 10 }
fn default_price_api_url() -> String { "https://price.jup.ag/v6/price".to_string() }
fn default_oracle_timeout() -> u64 { 5 }
fn default_gas_limit() -> u64 { crate::tx_builder::DEFAULT_GAS_LIMIT }
fn default_slippage() -> f64 { DEFAULT_SLIPPAGE }
fn default_max_price_impact() -> f64 { DEFAULT_MAX_PRICE_IMPACT }
fn default_confirmation_timeout() -> u64 { 120 }
fn default_poll_interval_ms() -> u64 { 500 }
fn default_metrics_port() -> u16 { 9090 }
fn default_true() -> bool { true }

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            price_api_url: default_price_api_url(),
            timeout_secs: default_oracle_timeout(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            default_slippage: default_slippage(),
            max_price_impact: default_max_price_impact(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: default_confirmation_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            quote_retry: RetryPolicy::default(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            metrics_port: default_metrics_port(),
            json_logs: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                url: "http://127.0.0.1:8545".to_string(),
                timeout_secs: default_rpc_timeout(),
            },
            oracle: OracleConfig::default(),
            contract: ContractConfig {
                address: String::new(),
                gas_limit: default_gas_limit(),
                max_gas_price: None,
            },
            trading: TradingConfig::default(),
            engine: EngineConfig::default(),
            wallet: WalletConfig {
                keypair_path: "~/.config/solana/id.json".to_string(),
            },
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config TOML")?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides, then validate
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `SWAP_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (used with the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_RPC_URL) {
            self.rpc.url = url;
        }
        if let Some(url) = lookup(ENV_PRICE_API_URL) {
            self.oracle.price_api_url = url;
        }
        if let Some(address) = lookup(ENV_CONTRACT_ADDRESS) {
            self.contract.address = address;
        }
        if let Some(path) = lookup(ENV_KEYPAIR_PATH) {
            self.wallet.keypair_path = path;
        }
    }

    /// Check invariants the engine relies on
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc.url.trim().is_empty() {
            bail!("rpc.url must not be empty");
        }
        if self.oracle.price_api_url.trim().is_empty() {
            bail!("oracle.price_api_url must not be empty");
        }
        if self.rpc.timeout_secs == 0 || self.oracle.timeout_secs == 0 {
            bail!("rpc.timeout_secs and oracle.timeout_secs must be positive");
        }
        if self.engine.confirmation_timeout_secs == 0 {
            bail!("engine.confirmation_timeout_secs must be positive");
        }
        self.contract_address()?;
        if self.contract.gas_limit == 0 {
            bail!("contract.gas_limit must be positive");
        }
        check_fraction("trading.default_slippage", self.trading.default_slippage)?;
        check_fraction("trading.max_price_impact", self.trading.max_price_impact)?;
        check_fraction(
            "engine.quote_retry.jitter_factor",
            self.engine.quote_retry.jitter_factor,
        )?;
        if self.engine.quote_retry.max_attempts == 0 {
            bail!("engine.quote_retry.max_attempts must be at least 1");
        }
        Ok(())
    }

    /// Parsed swap contract address
    pub fn contract_address(&self) -> anyhow::Result<Pubkey> {
        Pubkey::from_str(self.contract.address.trim())
            .with_context(|| format!("invalid contract.address '{}'", self.contract.address))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle.timeout_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.confirmation_timeout_secs)
    }

    /// Poll interval, clamped into the supported range
    pub fn poll_interval(&self) -> Duration {
        crate::submitter::clamp_poll_interval(Duration::from_millis(self.engine.poll_interval_ms))
    }
}

fn check_fraction(name: &str, value: f64) -> anyhow::Result<()> {
    if !value.is_finite() || !(0.0..1.0).contains(&value) {
        bail!("{} must be a fraction in [0, 1), got {}", name, value);
    }
    Ok(())
}
