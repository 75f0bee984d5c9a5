//! Shroud Configuration
//!
//! Handles loading configuration from:
//! 1. SHROUD_CONFIG env var (explicit path)
//! 2. ./shroud.toml (current directory)
//! 3. ~/.shroud/config.toml (user home)
//!
//! Environment variables take precedence over TOML config. The loaded value
//! is handed to the engine explicitly; there is no global instance.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

const CONFIG_FILE_NAME: &str = "shroud.toml";
const HOME_CONFIG_DIR: &str = ".shroud";
const HOME_CONFIG_FILE: &str = "config.toml";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_NODE_URL: &str = "http://127.0.0.1:29333/";
const DEFAULT_NODE_TIMEOUT_SECS: u64 = 30;

const DEFAULT_GENESIS_ADDRESS: &str = "sh1genesis00000000000000000000000000000000";
const DEFAULT_GENESIS_PRIVATE_KEY: &str = "privgenesis";

const DEFAULT_CONTRACT_NAME: &str = "MimbleWimble";
const DEFAULT_CONTRACT_SYMBOL: &str = "MWT";
const DEFAULT_ISSUE_AMOUNT: u64 = 100_000_000;
const DEFAULT_ACCOUNT_INIT_BALANCE: u64 = 10_000_000_000;

const DEFAULT_MAX_ITEMS: usize = 100;
const DEFAULT_CHUNK_PAUSE_MS: u64 = 5000;
const DEFAULT_FEE_LIMIT: u64 = 200_000_000;
const DEFAULT_ISSUE_ASSET_FEE_LIMIT: u64 = 5_050_000_000;
const DEFAULT_CONTRACT_FEE_LIMIT: u64 = 1_100_000_000;
const DEFAULT_GAS_PRICE: u64 = 1000;

const DEFAULT_FINALITY_ATTEMPTS: u32 = 35;
const DEFAULT_PROPAGATION_ATTEMPTS: u32 = 25;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_BACKOFF_CAP_MS: u64 = 8000;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShroudConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub genesis: GenesisConfig,
    #[serde(default)]
    pub contract: ContractConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default = "PollConfig::finality")]
    pub finality: PollConfig,
    #[serde(default = "PollConfig::propagation")]
    pub propagation: PollConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
}

impl Default for ShroudConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            genesis: GenesisConfig::default(),
            contract: ContractConfig::default(),
            batch: BatchConfig::default(),
            finality: PollConfig::finality(),
            propagation: PollConfig::propagation(),
            verification: VerificationConfig::default(),
        }
    }
}

/// Ledger node connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_node_url")]
    pub url: String,
    #[serde(default = "default_node_timeout")]
    pub timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_NODE_URL.into(),
            timeout_secs: DEFAULT_NODE_TIMEOUT_SECS,
        }
    }
}

fn default_node_url() -> String {
    DEFAULT_NODE_URL.into()
}
fn default_node_timeout() -> u64 {
    DEFAULT_NODE_TIMEOUT_SECS
}

/// The funding account with a pre-established balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisConfig {
    #[serde(default = "default_genesis_address")]
    pub address: String,
    #[serde(default = "default_genesis_private_key")]
    pub private_key: String,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_GENESIS_ADDRESS.into(),
            private_key: DEFAULT_GENESIS_PRIVATE_KEY.into(),
        }
    }
}

fn default_genesis_address() -> String {
    DEFAULT_GENESIS_ADDRESS.into()
}
fn default_genesis_private_key() -> String {
    DEFAULT_GENESIS_PRIVATE_KEY.into()
}

/// Confidential asset issued during setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractConfig {
    #[serde(default = "default_contract_name")]
    pub name: String,
    #[serde(default = "default_contract_symbol")]
    pub symbol: String,
    #[serde(default = "default_issue_amount")]
    pub issue_amount: u64,
    #[serde(default = "default_account_init_balance")]
    pub account_init_balance: u64,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CONTRACT_NAME.into(),
            symbol: DEFAULT_CONTRACT_SYMBOL.into(),
            issue_amount: DEFAULT_ISSUE_AMOUNT,
            account_init_balance: DEFAULT_ACCOUNT_INIT_BALANCE,
        }
    }
}

fn default_contract_name() -> String {
    DEFAULT_CONTRACT_NAME.into()
}
fn default_contract_symbol() -> String {
    DEFAULT_CONTRACT_SYMBOL.into()
}
fn default_issue_amount() -> u64 {
    DEFAULT_ISSUE_AMOUNT
}
fn default_account_init_balance() -> u64 {
    DEFAULT_ACCOUNT_INIT_BALANCE
}

/// Batch submission limits and fees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_chunk_pause_ms")]
    pub chunk_pause_ms: u64,
    #[serde(default = "default_fee_limit")]
    pub fee_limit: u64,
    #[serde(default = "default_issue_asset_fee_limit")]
    pub issue_asset_fee_limit: u64,
    #[serde(default = "default_contract_fee_limit")]
    pub contract_fee_limit: u64,
    #[serde(default = "default_gas_price")]
    pub gas_price: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            chunk_pause_ms: DEFAULT_CHUNK_PAUSE_MS,
            fee_limit: DEFAULT_FEE_LIMIT,
            issue_asset_fee_limit: DEFAULT_ISSUE_ASSET_FEE_LIMIT,
            contract_fee_limit: DEFAULT_CONTRACT_FEE_LIMIT,
            gas_price: DEFAULT_GAS_PRICE,
        }
    }
}

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}
fn default_chunk_pause_ms() -> u64 {
    DEFAULT_CHUNK_PAUSE_MS
}
fn default_fee_limit() -> u64 {
    DEFAULT_FEE_LIMIT
}
fn default_issue_asset_fee_limit() -> u64 {
    DEFAULT_ISSUE_ASSET_FEE_LIMIT
}
fn default_contract_fee_limit() -> u64 {
    DEFAULT_CONTRACT_FEE_LIMIT
}
fn default_gas_price() -> u64 {
    DEFAULT_GAS_PRICE
}

/// Spacing strategy between poll attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// A bounded polling loop (finality, account propagation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    pub max_attempts: u32,
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
    #[serde(default)]
    pub backoff: BackoffKind,
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_ms: u64,
}

impl PollConfig {
    pub fn finality() -> Self {
        Self::with_attempts(DEFAULT_FINALITY_ATTEMPTS)
    }

    pub fn propagation() -> Self {
        Self::with_attempts(DEFAULT_PROPAGATION_ATTEMPTS)
    }

    fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            backoff: BackoffKind::Fixed,
            backoff_cap_ms: DEFAULT_BACKOFF_CAP_MS,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_backoff_cap() -> u64 {
    DEFAULT_BACKOFF_CAP_MS
}

/// Pre-submission checks run on the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default = "default_local_checks")]
    pub local_checks: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self { local_checks: true }
    }
}

fn default_local_checks() -> bool {
    true
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {}={}", key, v),
        }
    }
}

/// Check if env var is set to a truthy value ("1" or "true")
fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Implementation
// ============================================================================

impl ShroudConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check SHROUD_CONFIG env var
        if let Ok(path) = env::var("SHROUD_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("SHROUD_CONFIG points to missing file {}", path.display());
        }

        // 2. Check ./shroud.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.shroud/config.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Node
        env_string("SHROUD_NODE_URL", &mut self.node.url);
        env_parse("SHROUD_NODE_TIMEOUT_SECS", &mut self.node.timeout_secs);

        // Genesis
        env_string("SHROUD_GENESIS_ADDRESS", &mut self.genesis.address);
        env_string("SHROUD_GENESIS_PRIVATE_KEY", &mut self.genesis.private_key);

        // Batch
        env_parse("SHROUD_BATCH_MAX_ITEMS", &mut self.batch.max_items);
        env_parse("SHROUD_BATCH_CHUNK_PAUSE_MS", &mut self.batch.chunk_pause_ms);

        // Polling
        env_parse("SHROUD_FINALITY_MAX_ATTEMPTS", &mut self.finality.max_attempts);
        env_parse("SHROUD_FINALITY_INTERVAL_MS", &mut self.finality.interval_ms);
        env_parse("SHROUD_PROPAGATION_MAX_ATTEMPTS", &mut self.propagation.max_attempts);

        // Verification
        if let Some(v) = env_bool("SHROUD_LOCAL_CHECKS") {
            self.verification.local_checks = v;
        }
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(HOME_CONFIG_DIR).join(HOME_CONFIG_FILE))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
