//! Per-address serialization of orchestration calls.
//!
//! The ledger orders one account's transactions by its sequence number, so
//! a second submission while the first is unconfirmed can be dropped,
//! replaced, or mined out of order. Every orchestrator call holds its
//! address's lane for the whole check → submit → confirm sequence.
//! Different addresses never wait on each other.
//!
//! Releasing the lane is not enough on its own: a call that ends in
//! [`ErrorKind::NetworkTimeout`] leaves its transaction in flight. The
//! lane notes that hash, and the next [`AddressSequencer::acquire`] for the
//! address re-checks it first. While the ledger still reports it pending,
//! the new call is refused with the same timeout instead of submitting.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::error::ErrorKind;
use crate::ledger::{Address, Ledger, TxHash, TxStatus};
use crate::lifecycle::recheck_status;

/// A submitted transaction whose confirmation wait ran out.
#[derive(Clone, Copy, Debug)]
struct Outstanding {
    tx_hash: TxHash,
    since: Instant,
}

type Lanes = DashMap<Address, Arc<Mutex<()>>>;

/// Registry of per-address async locks and in-flight transactions.
#[derive(Default)]
pub struct AddressSequencer {
    lanes: Arc<Lanes>,
    outstanding: Arc<DashMap<Address, Outstanding>>,
}

/// Exclusive use of one address. Released on drop; the lane entry is
/// pruned once nobody else holds or waits for it.
pub struct Lane {
    address: Address,
    guard: Option<OwnedMutexGuard<()>>,
    lanes: Arc<Lanes>,
    outstanding: Arc<DashMap<Address, Outstanding>>,
}

impl AddressSequencer {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for `address`'s lane without looking at in-flight
    /// transactions.
    pub async fn lock(&self, address: Address) -> Lane {
        // Clone the Arc out so no DashMap shard lock is held across the await.
        let lane = Arc::clone(
            self.lanes
                .entry(address)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let guard = lane.lock_owned().await;
        Lane {
            address,
            guard: Some(guard),
            lanes: Arc::clone(&self.lanes),
            outstanding: Arc::clone(&self.outstanding),
        }
    }

    /// Waits for `address`'s lane, then settles any transaction a previous
    /// call left unconfirmed.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NetworkTimeout`] carrying the outstanding hash while the
    /// ledger still reports it pending; [`ErrorKind::LedgerUnavailable`]
    /// when the re-check itself cannot be served. The entry is kept in both
    /// cases.
    pub async fn acquire(&self, address: Address, ledger: &dyn Ledger) -> Result<Lane, ErrorKind> {
        let lane = self.lock(address).await;
        let Some(outstanding) = self.outstanding.get(&address).map(|entry| *entry) else {
            return Ok(lane);
        };

        match recheck_status(ledger, outstanding.tx_hash).await? {
            TxStatus::Pending => {
                warn!(
                    %address,
                    tx_hash = %outstanding.tx_hash,
                    "previous transaction still pending; refusing to submit another"
                );
                Err(ErrorKind::NetworkTimeout {
                    tx_hash: outstanding.tx_hash,
                    waited_ms: outstanding.since.elapsed().as_millis() as u64,
                })
            }
            status => {
                info!(
                    %address,
                    tx_hash = %outstanding.tx_hash,
                    status = status_label(&status),
                    "outstanding transaction settled"
                );
                self.outstanding.remove(&address);
                Ok(lane)
            }
        }
    }

    /// The unconfirmed transaction recorded for `address`, if any.
    pub fn outstanding(&self, address: Address) -> Option<TxHash> {
        self.outstanding.get(&address).map(|entry| entry.tx_hash)
    }

    /// Number of lanes currently held or waited on.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }
}

fn status_label(status: &TxStatus) -> &'static str {
    match status {
        TxStatus::Pending => "pending",
        TxStatus::Confirmed(_) => "confirmed",
        TxStatus::Reverted { .. } => "reverted",
        TxStatus::Unknown => "unknown",
    }
}

impl Lane {
    /// Passes `err` through, remembering its transaction if the error
    /// leaves one in flight.
    pub fn note(&self, err: ErrorKind) -> ErrorKind {
        if let (true, Some(tx_hash)) = (err.requires_status_recheck(), err.tx_hash()) {
            debug!(address = %self.address, %tx_hash, "recording unconfirmed transaction");
            self.outstanding.entry(self.address).or_insert(Outstanding {
                tx_hash,
                since: Instant::now(),
            });
        }
        err
    }
}

impl Drop for Lane {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or waits.
        self.lanes
            .remove_if(&self.address, |_, lane| Arc::strong_count(lane) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_address_is_exclusive() {
        let seq = Arc::new(AddressSequencer::new());
        let addr = Address::repeat_byte(1);

        let guard = seq.lock(addr).await;
        let seq2 = Arc::clone(&seq);
        let waiter = tokio::spawn(async move {
            let _g = seq2.lock(addr).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn different_addresses_do_not_block() {
        let seq = AddressSequencer::new();
        let _a = seq.lock(Address::repeat_byte(1)).await;
        let _b = tokio::time::timeout(
            Duration::from_millis(50),
            seq.lock(Address::repeat_byte(2)),
        )
        .await
        .expect("second address should not wait");
        assert_eq!(seq.lane_count(), 2);
    }

    #[tokio::test]
    async fn released_lanes_are_pruned() {
        let seq = Arc::new(AddressSequencer::new());
        let addr = Address::repeat_byte(3);

        let held = seq.lock(addr).await;
        let seq2 = Arc::clone(&seq);
        let waiter = tokio::spawn(async move {
            let _g = seq2.lock(addr).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The waiter still references the lane, so it survives this release.
        drop(held);
        waiter.await.unwrap();
        assert_eq!(seq.lane_count(), 0);

        for byte in 10..20 {
            drop(seq.lock(Address::repeat_byte(byte)).await);
        }
        assert_eq!(seq.lane_count(), 0);
    }

    #[tokio::test]
    async fn only_timeouts_are_noted() {
        let seq = AddressSequencer::new();
        let addr = Address::repeat_byte(4);
        let first = TxHash::from_bytes([1u8; 32]);
        let lane = seq.lock(addr).await;

        lane.note(ErrorKind::PoolFull(crate::ledger::PoolId(1)));
        assert_eq!(seq.outstanding(addr), None);

        lane.note(ErrorKind::NetworkTimeout {
            tx_hash: first,
            waited_ms: 5_000,
        });
        lane.note(ErrorKind::NetworkTimeout {
            tx_hash: TxHash::from_bytes([2u8; 32]),
            waited_ms: 5_000,
        });
        assert_eq!(seq.outstanding(addr), Some(first));
    }
}
