//! # Orchestrator Configuration & Constants
//!
//! Every bound the orchestrators enforce before touching the ledger lives
//! here. The contracts enforce their own copies of these limits; checking
//! them locally first means a bad request costs nothing instead of costing
//! gas for a guaranteed revert.
//!
//! [`OrchestratorConfig`] carries the per-deployment values (contract
//! addresses, payment asset, confirmation timeout) and can be loaded from
//! JSON.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::{Address, PaymentAsset, TokenAmount};

// ---------------------------------------------------------------------------
// Token Denomination
// ---------------------------------------------------------------------------

/// Decimal places of the ledger's smallest unit.
pub const TOKEN_DECIMALS: u32 = 18;

/// Smallest units per whole token (10^18).
pub const UNITS_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Lock Window
// ---------------------------------------------------------------------------

/// Seconds in a day. Lock windows are specified in days.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Shortest lock window accepted for vaults and pools.
pub const MIN_LOCK_DAYS: u64 = 7;

/// Longest lock window accepted for vaults and pools.
pub const MAX_LOCK_DAYS: u64 = 365;

// ---------------------------------------------------------------------------
// Vault Bounds
// ---------------------------------------------------------------------------

/// Smallest vault target: 0.01 tokens.
pub const VAULT_MIN_TARGET: TokenAmount = TokenAmount::from_base_units(UNITS_PER_TOKEN / 100);

/// Largest vault target: 1000 tokens.
pub const VAULT_MAX_TARGET: TokenAmount = TokenAmount::from_whole(1_000);

// ---------------------------------------------------------------------------
// Pool Bounds
// ---------------------------------------------------------------------------

/// Smallest pool target: 0.1 tokens.
pub const POOL_MIN_TARGET: TokenAmount = TokenAmount::from_base_units(UNITS_PER_TOKEN / 10);

/// Largest pool target: 10,000 tokens.
pub const POOL_MAX_TARGET: TokenAmount = TokenAmount::from_whole(10_000);

/// Fewest members a pool may be sized for. A pool of one is a vault.
pub const POOL_MIN_MEMBERS: u32 = 2;

/// Most members a pool may be sized for.
pub const POOL_MAX_MEMBERS: u32 = 50;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// How long to wait for a submitted transaction to be mined before giving
/// up on the wait (not on the transaction) and reporting a timeout.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Deployment Config
// ---------------------------------------------------------------------------

/// Errors loading an [`OrchestratorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file was not valid config JSON.
    #[error("malformed config: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A value parsed but is unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Addresses of the deployed contracts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    /// The token contract used for approvals and balances.
    pub token: Address,
    /// The savings vault contract (spender for vault deposits).
    pub vault: Address,
    /// The group pool contract (spender for pool contributions).
    pub pool: Address,
}

/// Per-deployment orchestrator settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Deployed contract addresses.
    pub contracts: ContractAddresses,

    /// Asset moved by deposits and contributions.
    #[serde(default)]
    pub payment_asset: PaymentAsset,

    /// Confirmation wait bound in milliseconds.
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
}

fn default_confirmation_timeout_ms() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT.as_millis() as u64
}

impl OrchestratorConfig {
    /// Config for `contracts` with default asset and timeout.
    pub fn new(contracts: ContractAddresses) -> Self {
        Self {
            contracts,
            payment_asset: PaymentAsset::default(),
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
        }
    }

    /// Overrides the confirmation timeout.
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Overrides the payment asset.
    pub fn with_payment_asset(mut self, asset: PaymentAsset) -> Self {
        self.payment_asset = asset;
        self
    }

    /// The confirmation wait bound.
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    /// Parses and validates a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Rejects configs that would make every operation fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.confirmation_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "confirmation_timeout_ms must be positive".into(),
            ));
        }
        let c = &self.contracts;
        if c.vault.is_zero() || c.pool.is_zero() {
            return Err(ConfigError::Invalid(
                "vault and pool contract addresses are required".into(),
            ));
        }
        if self.payment_asset == PaymentAsset::Token && c.token.is_zero() {
            return Err(ConfigError::Invalid(
                "token contract address is required when paying in tokens".into(),
            ));
        }
        Ok(())
    }
}
