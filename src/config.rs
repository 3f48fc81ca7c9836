//! Configuration management for the wallet pipeline
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub wallet: WalletConfig,
    pub rpc: RpcConfig,
    pub signer: SignerConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub receipt: ReceiptConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub address: String,
    pub chain_id: u64,
    pub network_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub url: String,
    #[serde(default = "default_rpc_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    pub url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_signer_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Safety margins applied on top of node estimates.
///
/// Multipliers are applied in basis points: anything past the fourth decimal
/// place is rounded away, so 1.00004 behaves as 1.0.
#[derive(Debug, Clone, Deserialize)]
pub struct GasConfig {
    #[serde(default = "default_fee_per_gas_multiplier")]
    pub fee_per_gas_multiplier: f64,
    #[serde(default = "default_gas_limit_multiplier")]
    pub gas_limit_multiplier: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptConfig {
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Deadline for receipt lookups; 0 waits indefinitely
    #[serde(default = "default_receipt_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_rpc_poll_interval_ms() -> u64 {
    100
}

fn default_signer_poll_interval_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_fee_per_gas_multiplier() -> f64 {
    1.0
}

fn default_gas_limit_multiplier() -> f64 {
    1.2
}

fn default_receipt_poll_interval_ms() -> u64 {
    100
}

fn default_receipt_timeout_secs() -> u64 {
    120
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            fee_per_gas_multiplier: default_fee_per_gas_multiplier(),
            gas_limit_multiplier: default_gas_limit_multiplier(),
        }
    }
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_receipt_poll_interval_ms(),
            timeout_secs: default_receipt_timeout_secs(),
        }
    }
}

impl ReceiptConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl WalletConfig {
    /// Parse the configured account address
    pub fn account_address(&self) -> Result<Address> {
        self.address
            .parse::<Address>()
            .with_context(|| format!("Invalid wallet address: {}", self.address))
    }
}

impl Settings {
    /// Load settings from the file named by `WALLET_PIPELINE_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("WALLET_PIPELINE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    /// Parse settings from TOML text
    pub fn from_toml(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let mut settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.signer.api_key = settings
            .signer
            .api_key
            .take()
            .filter(|key| !key.trim().is_empty());

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        self.wallet.account_address()?;

        if self.wallet.chain_id == 0 {
            anyhow::bail!("wallet.chain_id must be non-zero");
        }
        if self.rpc.url.is_empty() {
            anyhow::bail!("rpc.url is not configured");
        }
        if self.signer.url.is_empty() {
            anyhow::bail!("signer.url is not configured");
        }

        if self.gas.fee_per_gas_multiplier < 1.0 {
            tracing::warn!(
                "fee_per_gas_multiplier {} is below 1.0 - will use 1.0",
                self.gas.fee_per_gas_multiplier
            );
        }
        if self.gas.gas_limit_multiplier < 1.0 {
            tracing::warn!(
                "gas_limit_multiplier {} is below 1.0 - will use 1.0",
                self.gas.gas_limit_multiplier
            );
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
    }

    let mut result = input.to_string();

    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
