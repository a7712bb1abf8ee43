//! Explicit session handles.
//!
//! A [`Session`] pairs the connected signer's address with a ledger handle.
//! It is passed into every orchestrator call instead of living in a global,
//! so several sessions can run side by side and tests can hand in doubles.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ErrorKind;
use crate::ledger::{Address, Ledger};

/// A connected signer and its read/write ledger handle.
#[derive(Clone)]
pub struct Session {
    address: Address,
    ledger: Arc<dyn Ledger>,
}

impl Session {
    /// Binds `address` to `ledger`.
    pub fn new(address: Address, ledger: Arc<dyn Ledger>) -> Self {
        Self { address, ledger }
    }

    /// The signer's address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The ledger handle.
    pub fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Supplies connected sessions. Wallet connection and key custody live
/// behind this trait, outside the orchestration core.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns a session for the currently connected signer.
    async fn connect(&self) -> Result<Session, ErrorKind>;
}
