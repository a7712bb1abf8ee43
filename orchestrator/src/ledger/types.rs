//! # Ledger Value Types
//!
//! The primitive types that cross the ledger boundary: addresses, transaction
//! hashes, pool identifiers and token amounts, plus the record shapes the
//! vault and pool contracts hand back from their read calls.
//!
//! All amounts are integers in the ledger's smallest unit (18 decimals). The
//! decimal string form exists for humans and JSON; arithmetic never touches
//! floating point.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::{TOKEN_DECIMALS, UNITS_PER_TOKEN};

// ---------------------------------------------------------------------------
// Parse Errors
// ---------------------------------------------------------------------------

/// Errors produced when parsing the textual form of a ledger value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input was not valid hex, or had the wrong length.
    #[error("invalid {kind}: {reason}")]
    InvalidHex {
        /// What was being parsed ("address", "tx hash").
        kind: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The input was not a well-formed decimal amount.
    #[error("invalid amount '{input}': {reason}")]
    InvalidAmount {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

fn decode_fixed<const N: usize>(s: &str, kind: &'static str) -> Result<[u8; N], ParseError> {
    let trimmed = s.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(body).map_err(|e| ParseError::InvalidHex {
        kind,
        reason: e.to_string(),
    })?;
    bytes.try_into().map_err(|v: Vec<u8>| ParseError::InvalidHex {
        kind,
        reason: format!("expected {} bytes, got {}", N, v.len()),
    })
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte ledger account or contract address.
///
/// Parsing accepts any hex casing, and equality compares raw bytes, so two
/// addresses that differ only in checksum casing are the same address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address. Used as the "no referrer" sentinel.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Wraps raw address bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// An address whose every byte is `byte`. Handy for fixtures.
    pub const fn repeat_byte(byte: u8) -> Self {
        Self([byte; 20])
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns `true` for the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s, "address").map(Self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// TxHash
// ---------------------------------------------------------------------------

/// A 32-byte transaction identifier. Doubles as the reconciliation
/// idempotency key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Wraps raw hash bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for TxHash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s, "tx hash").map(Self)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// PoolId
// ---------------------------------------------------------------------------

/// Ledger-assigned pool identifier. Never chosen by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub u64);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TokenAmount
// ---------------------------------------------------------------------------

/// A token quantity in smallest units (10^-18 of a whole token).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TokenAmount(u128);

impl TokenAmount {
    /// Zero tokens.
    pub const ZERO: TokenAmount = TokenAmount(0);

    /// Wraps a raw smallest-unit quantity.
    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    /// `whole` full tokens.
    pub const fn from_whole(whole: u64) -> Self {
        Self(whole as u128 * UNITS_PER_TOKEN)
    }

    /// The raw smallest-unit quantity.
    pub const fn base_units(&self) -> u128 {
        self.0
    }

    /// Returns `true` if this is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition. `None` on overflow.
    pub fn checked_add(self, rhs: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_add(rhs.0).map(TokenAmount)
    }

    /// Checked subtraction. `None` on underflow.
    pub fn checked_sub(self, rhs: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_sub(rhs.0).map(TokenAmount)
    }

    /// Saturating subtraction.
    pub fn saturating_sub(self, rhs: TokenAmount) -> TokenAmount {
        TokenAmount(self.0.saturating_sub(rhs.0))
    }

    /// Parses a decimal string such as `"0.01"` or `"1000"`.
    ///
    /// At most 18 fractional digits are accepted. Signs, exponents and
    /// thousands separators are rejected outright.
    pub fn parse_decimal(input: &str) -> Result<Self, ParseError> {
        let invalid = |reason: &'static str| ParseError::InvalidAmount {
            input: input.to_string(),
            reason,
        };

        let s = input.trim();
        if s.is_empty() {
            return Err(invalid("empty"));
        }

        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid("no digits"));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid("non-digit character"));
        }
        if frac_part.len() > TOKEN_DECIMALS as usize {
            return Err(invalid("too many fractional digits"));
        }

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid("integer part overflow"))?
        };
        let mut frac: u128 = if frac_part.is_empty() {
            0
        } else {
            frac_part.parse().map_err(|_| invalid("fraction overflow"))?
        };
        frac *= 10u128.pow(TOKEN_DECIMALS - frac_part.len() as u32);

        whole
            .checked_mul(UNITS_PER_TOKEN)
            .and_then(|w| w.checked_add(frac))
            .map(TokenAmount)
            .ok_or_else(|| invalid("amount overflow"))
    }
}

impl FromStr for TokenAmount {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_decimal(s)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNITS_PER_TOKEN;
        let frac = self.0 % UNITS_PER_TOKEN;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0width$}", frac, width = TOKEN_DECIMALS as usize);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_decimal(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Payment Asset
// ---------------------------------------------------------------------------

/// Which asset a value-transferring call moves. Maps onto the contracts'
/// `tokenFlag` argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentAsset {
    /// The configured token contract. Requires an allowance.
    #[default]
    Token,
    /// The ledger's native currency. No allowance involved.
    Native,
}

impl PaymentAsset {
    /// The `tokenFlag` value passed to the contracts.
    pub fn token_flag(&self) -> bool {
        matches!(self, PaymentAsset::Token)
    }
}

// ---------------------------------------------------------------------------
// Contract Records
// ---------------------------------------------------------------------------

/// A savings vault as reported by `goals(address)`.
///
/// Keyed by owner address on the ledger; there is no other identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultRecord {
    /// The owning address (and the vault's identity).
    pub owner: Address,
    /// Savings target.
    pub target_amount: TokenAmount,
    /// Amount deposited so far.
    pub current_amount: TokenAmount,
    /// When the lock window opened.
    pub lock_start: DateTime<Utc>,
    /// When the lock window closes.
    pub lock_end: DateTime<Utc>,
    /// Set once the goal has been completed or withdrawn.
    pub is_completed: bool,
    /// Whether the vault currently accepts deposits.
    pub is_active: bool,
}

/// A group pool as reported by the pool contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRecord {
    /// Ledger-assigned identifier.
    pub pool_id: PoolId,
    /// Address that created the pool.
    pub creator: Address,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Collective savings target.
    pub target_amount: TokenAmount,
    /// Sum of all contributions.
    pub current_amount: TokenAmount,
    /// Capacity.
    pub max_members: u32,
    /// Members joined so far. Never exceeds `max_members`.
    pub current_member_count: u32,
    /// When the lock window opened.
    pub lock_start: DateTime<Utc>,
    /// When the lock window closes.
    pub lock_end: DateTime<Utc>,
    /// Whether the pool accepts contributions.
    pub is_active: bool,
}

/// A (pool, address) membership with its cumulative contribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolMember {
    /// Pool the member belongs to.
    pub pool_id: PoolId,
    /// Member address.
    pub address: Address,
    /// Total contributed by this member.
    pub contributed: TokenAmount,
}

/// Arguments of the pool contract's `createPool` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePoolCall {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Collective savings target.
    pub target_amount: TokenAmount,
    /// Capacity.
    pub max_members: u32,
    /// Lock window length in seconds.
    pub lock_duration_secs: u64,
    /// `true` when contributions are in the token, `false` for native.
    pub token_flag: bool,
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// One event emitted during a transaction.
///
/// `data` carries the decoded event arguments keyed by their ABI names, as
/// the ledger binding delivers them. Typed decoding happens in
/// [`super::events`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    /// Contract that emitted the event.
    pub emitter: Address,
    /// Event name, e.g. `"PoolCreated"`.
    pub event: String,
    /// Event arguments.
    pub data: serde_json::Value,
}

/// Execution outcome recorded in a receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Executed without reverting.
    Success,
    /// Mined but reverted.
    Reverted {
        /// Revert reason as reported by the ledger, if any.
        reason: Option<String>,
    },
}

/// A mined transaction's receipt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    /// The transaction this receipt belongs to.
    pub tx_hash: TxHash,
    /// Block the transaction was mined in.
    pub block_number: u64,
    /// Execution outcome.
    pub status: ReceiptStatus,
    /// Emitted events in emission order.
    pub logs: Vec<RawLog>,
}

impl TxReceipt {
    /// Returns `true` when the transaction executed without reverting.
    pub fn succeeded(&self) -> bool {
        matches!(self.status, ReceiptStatus::Success)
    }
}

/// Result of an explicit status re-check for a submitted transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum TxStatus {
    /// Known to the ledger but not mined yet.
    Pending,
    /// Mined successfully.
    Confirmed(TxReceipt),
    /// Mined and reverted.
    Reverted {
        /// Revert reason, if any.
        reason: Option<String>,
    },
    /// The ledger has no record of the transaction. It may have been
    /// dropped, or may not have propagated yet.
    Unknown,
}
