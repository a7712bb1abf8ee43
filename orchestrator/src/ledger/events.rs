//! Typed decoding of receipt events.
//!
//! The pool contract does not return the new pool's id from `createPool`;
//! the only place it appears is the `PoolCreated` event. Decoding yields a
//! tagged [`PoolEvent`] so the "event missing" case is an ordinary branch
//! for the caller to handle.

use serde_json::Value;

use super::types::{Address, PoolId, TxReceipt};

/// Name of the pool contract's creation event.
pub const POOL_CREATED_EVENT: &str = "PoolCreated";

/// Outcome of scanning a receipt for the pool creation event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolEvent {
    /// The pool contract announced a new pool.
    PoolCreated {
        /// Ledger-assigned id.
        pool_id: PoolId,
        /// Creator, when the event carries it.
        creator: Option<Address>,
    },
    /// No well-formed `PoolCreated` event from the pool contract was found.
    Unrecognized,
}

/// Scans `receipt` for a `PoolCreated` event emitted by `pool_contract`.
///
/// Events from any other emitter are ignored, so a malicious token hook
/// cannot forge a pool id. The first well-formed match wins.
pub fn decode_pool_created(receipt: &TxReceipt, pool_contract: Address) -> PoolEvent {
    receipt
        .logs
        .iter()
        .filter(|log| log.emitter == pool_contract && log.event == POOL_CREATED_EVENT)
        .find_map(|log| {
            let pool_id = read_u64(log.data.get("poolId")?)?;
            let creator = log
                .data
                .get("creator")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok());
            Some(PoolEvent::PoolCreated {
                pool_id: PoolId(pool_id),
                creator,
            })
        })
        .unwrap_or(PoolEvent::Unrecognized)
}

// uint256 fields arrive either as JSON numbers or as decimal/hex strings.
fn read_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex_digits) => u64::from_str_radix(hex_digits, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    }
}
