//! A wallet connector over the simulated chain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use savings_orchestrator::error::ErrorKind;
use savings_orchestrator::ledger::Address;
use savings_orchestrator::session::{Session, SessionProvider};

use crate::chain::SimulatedChain;

/// Hands out sessions for one address on a [`SimulatedChain`].
pub struct SimulatedWallet {
    chain: Arc<SimulatedChain>,
    address: Address,
    declined: AtomicBool,
}

impl SimulatedWallet {
    pub fn new(chain: Arc<SimulatedChain>, address: Address) -> Self {
        Self {
            chain,
            address,
            declined: AtomicBool::new(false),
        }
    }

    /// Makes the next connection requests fail as if the user closed the
    /// wallet prompt.
    pub fn decline_connections(&self, declined: bool) {
        self.declined.store(declined, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionProvider for SimulatedWallet {
    async fn connect(&self) -> Result<Session, ErrorKind> {
        if self.declined.load(Ordering::SeqCst) {
            return Err(ErrorKind::UserRejected("wallet connection declined".into()));
        }
        Ok(self.chain.session(self.address))
    }
}
