//! Shared test harness: a scripted ledger double that records every call.
//!
//! Writes mint sequential transaction hashes and store a receipt that
//! `wait_for_receipt` hands back, unless receipts are being held, in which
//! case the wait never resolves.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use savings_orchestrator::config::{ContractAddresses, OrchestratorConfig};
use savings_orchestrator::ledger::{
    Address, CreatePoolCall, LedgerError, PoolId, PoolLedger, PoolRecord, RawLog, ReceiptLedger,
    ReceiptStatus, TokenAmount, TokenLedger, TxHash, TxReceipt, TxStatus, VaultLedger,
    VaultRecord, POOL_CREATED_EVENT,
};
use savings_orchestrator::metrics::OrchestratorMetrics;
use savings_orchestrator::session::Session;

pub const TOKEN: Address = Address::repeat_byte(0x70);
pub const VAULT: Address = Address::repeat_byte(0x7a);
pub const POOL: Address = Address::repeat_byte(0x7b);
pub const ALICE: Address = Address::repeat_byte(0xa1);
pub const BOB: Address = Address::repeat_byte(0xb0);

pub fn tokens(whole: u64) -> TokenAmount {
    TokenAmount::from_whole(whole)
}

pub fn amount(decimal: &str) -> TokenAmount {
    TokenAmount::parse_decimal(decimal).unwrap()
}

pub fn config() -> OrchestratorConfig {
    OrchestratorConfig::new(ContractAddresses {
        token: TOKEN,
        vault: VAULT,
        pool: POOL,
    })
    .with_confirmation_timeout(Duration::from_secs(5))
}

pub fn metrics() -> Arc<OrchestratorMetrics> {
    Arc::new(OrchestratorMetrics::new().unwrap())
}

/// One recorded ledger call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    BalanceOf(Address),
    NativeBalanceOf(Address),
    Allowance { owner: Address, spender: Address },
    Approve { spender: Address, amount: TokenAmount },
    CreateGoal { target: TokenAmount, lock_secs: u64 },
    Deposit { amount: TokenAmount },
    HasGoal(Address),
    Goal(Address),
    CreatePool { name: String, max_members: u32 },
    JoinPool { pool_id: PoolId, amount: TokenAmount, referrer: Address },
    ContributeToPool { pool_id: PoolId, amount: TokenAmount },
    PoolMembers(PoolId),
    Pool(PoolId),
    WaitForReceipt(TxHash),
    TransactionStatus(TxHash),
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Call::Approve { .. }
                | Call::CreateGoal { .. }
                | Call::Deposit { .. }
                | Call::CreatePool { .. }
                | Call::JoinPool { .. }
                | Call::ContributeToPool { .. }
        )
    }
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    balances: HashMap<Address, TokenAmount>,
    native_balances: HashMap<Address, TokenAmount>,
    allowances: HashMap<(Address, Address), TokenAmount>,
    goals: HashSet<Address>,
    members: HashMap<PoolId, Vec<Address>>,
    receipts: HashMap<TxHash, TxReceipt>,
    reverts: HashMap<&'static str, String>,
    reject_signer: bool,
    hold_receipts: bool,
    omit_pool_event: bool,
    reads_down: bool,
    next_tx: u64,
    next_pool_id: u64,
}

/// Scripted, recording implementation of every ledger trait.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<State>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        let ledger = Self::default();
        ledger.state.lock().next_pool_id = 1;
        Arc::new(ledger)
    }

    pub fn session(self: &Arc<Self>, address: Address) -> Session {
        Session::new(address, self.clone())
    }

    // -- scripting ---------------------------------------------------------

    pub fn set_balance(&self, owner: Address, amount: TokenAmount) {
        self.state.lock().balances.insert(owner, amount);
    }

    pub fn set_native_balance(&self, owner: Address, amount: TokenAmount) {
        self.state.lock().native_balances.insert(owner, amount);
    }

    pub fn set_allowance(&self, owner: Address, spender: Address, amount: TokenAmount) {
        self.state.lock().allowances.insert((owner, spender), amount);
    }

    pub fn give_goal(&self, owner: Address) {
        self.state.lock().goals.insert(owner);
    }

    pub fn set_members(&self, pool_id: PoolId, members: Vec<Address>) {
        self.state.lock().members.insert(pool_id, members);
    }

    /// Receipts for `operation` (e.g. `"join_pool"`) come back reverted.
    pub fn revert(&self, operation: &'static str, reason: &str) {
        self.state.lock().reverts.insert(operation, reason.to_string());
    }

    pub fn reject_signatures(&self) {
        self.state.lock().reject_signer = true;
    }

    pub fn hold_receipts(&self, hold: bool) {
        self.state.lock().hold_receipts = hold;
    }

    pub fn omit_pool_event(&self) {
        self.state.lock().omit_pool_event = true;
    }

    pub fn take_reads_down(&self) {
        self.state.lock().reads_down = true;
    }

    // -- inspection --------------------------------------------------------

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn allowance_of(&self, owner: Address, spender: Address) -> TokenAmount {
        self.state
            .lock()
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(TokenAmount::ZERO)
    }

    // -- internals ---------------------------------------------------------

    fn read(&self, call: Call) -> Result<parking_lot::MutexGuard<'_, State>, LedgerError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.reads_down {
            return Err(LedgerError::Transport("connection refused".into()));
        }
        Ok(state)
    }

    fn submit(&self, operation: &'static str, call: Call) -> Result<TxHash, LedgerError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.reject_signer {
            return Err(LedgerError::SignerRejected("user denied transaction signature".into()));
        }

        state.next_tx += 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&state.next_tx.to_be_bytes());
        let tx_hash = TxHash::from_bytes(bytes);

        let status = match state.reverts.get(operation) {
            Some(reason) => ReceiptStatus::Reverted {
                reason: Some(reason.clone()),
            },
            None => ReceiptStatus::Success,
        };
        let mut logs = Vec::new();
        if operation == "create_pool" && status == ReceiptStatus::Success && !state.omit_pool_event
        {
            let pool_id = state.next_pool_id;
            state.next_pool_id += 1;
            logs.push(RawLog {
                emitter: POOL,
                event: POOL_CREATED_EVENT.to_string(),
                data: json!({ "poolId": pool_id }),
            });
        }
        let block_number = state.next_tx;
        state.receipts.insert(
            tx_hash,
            TxReceipt {
                tx_hash,
                block_number,
                status,
                logs,
            },
        );
        Ok(tx_hash)
    }
}

#[async_trait]
impl TokenLedger for MockLedger {
    async fn balance_of(&self, owner: Address) -> Result<TokenAmount, LedgerError> {
        let state = self.read(Call::BalanceOf(owner))?;
        Ok(state.balances.get(&owner).copied().unwrap_or_default())
    }

    async fn native_balance_of(&self, owner: Address) -> Result<TokenAmount, LedgerError> {
        let state = self.read(Call::NativeBalanceOf(owner))?;
        Ok(state.native_balances.get(&owner).copied().unwrap_or_default())
    }

    async fn allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> Result<TokenAmount, LedgerError> {
        let state = self.read(Call::Allowance { owner, spender })?;
        Ok(state
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn approve(
        &self,
        signer: Address,
        spender: Address,
        amount: TokenAmount,
    ) -> Result<TxHash, LedgerError> {
        let tx_hash = self.submit("approve", Call::Approve { spender, amount })?;
        let mut state = self.state.lock();
        if state.reverts.get("approve").is_none() {
            state.allowances.insert((signer, spender), amount);
        }
        Ok(tx_hash)
    }
}

#[async_trait]
impl VaultLedger for MockLedger {
    async fn create_goal(
        &self,
        _signer: Address,
        target_amount: TokenAmount,
        lock_duration_secs: u64,
        _token_flag: bool,
    ) -> Result<TxHash, LedgerError> {
        self.submit(
            "create_goal",
            Call::CreateGoal {
                target: target_amount,
                lock_secs: lock_duration_secs,
            },
        )
    }

    async fn deposit(
        &self,
        _signer: Address,
        amount: TokenAmount,
        _token_flag: bool,
    ) -> Result<TxHash, LedgerError> {
        self.submit("deposit", Call::Deposit { amount })
    }

    async fn has_goal(&self, owner: Address) -> Result<bool, LedgerError> {
        let state = self.read(Call::HasGoal(owner))?;
        Ok(state.goals.contains(&owner))
    }

    async fn goal(&self, owner: Address) -> Result<Option<VaultRecord>, LedgerError> {
        self.read(Call::Goal(owner))?;
        Ok(None)
    }
}

#[async_trait]
impl PoolLedger for MockLedger {
    async fn create_pool(
        &self,
        _signer: Address,
        call: &CreatePoolCall,
    ) -> Result<TxHash, LedgerError> {
        self.submit(
            "create_pool",
            Call::CreatePool {
                name: call.name.clone(),
                max_members: call.max_members,
            },
        )
    }

    async fn join_pool(
        &self,
        _signer: Address,
        pool_id: PoolId,
        amount: TokenAmount,
        _token_flag: bool,
        referrer: Address,
    ) -> Result<TxHash, LedgerError> {
        self.submit(
            "join_pool",
            Call::JoinPool {
                pool_id,
                amount,
                referrer,
            },
        )
    }

    async fn contribute_to_pool(
        &self,
        _signer: Address,
        pool_id: PoolId,
        amount: TokenAmount,
        _token_flag: bool,
    ) -> Result<TxHash, LedgerError> {
        self.submit("contribute_to_pool", Call::ContributeToPool { pool_id, amount })
    }

    async fn pool_members(&self, pool_id: PoolId) -> Result<Vec<Address>, LedgerError> {
        let state = self.read(Call::PoolMembers(pool_id))?;
        Ok(state.members.get(&pool_id).cloned().unwrap_or_default())
    }

    async fn pool(&self, pool_id: PoolId) -> Result<Option<PoolRecord>, LedgerError> {
        self.read(Call::Pool(pool_id))?;
        Ok(None)
    }
}

#[async_trait]
impl ReceiptLedger for MockLedger {
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, LedgerError> {
        let (held, receipt) = {
            let mut state = self.state.lock();
            state.calls.push(Call::WaitForReceipt(tx_hash));
            (state.hold_receipts, state.receipts.get(&tx_hash).cloned())
        };
        if held {
            std::future::pending::<()>().await;
        }
        receipt.ok_or(LedgerError::UnknownTransaction(tx_hash))
    }

    async fn transaction_status(&self, tx_hash: TxHash) -> Result<TxStatus, LedgerError> {
        let mut state = self.state.lock();
        state.calls.push(Call::TransactionStatus(tx_hash));
        if state.hold_receipts {
            return Ok(TxStatus::Pending);
        }
        match state.receipts.get(&tx_hash) {
            Some(receipt) => match &receipt.status {
                ReceiptStatus::Success => Ok(TxStatus::Confirmed(receipt.clone())),
                ReceiptStatus::Reverted { reason } => Ok(TxStatus::Reverted {
                    reason: reason.clone(),
                }),
            },
            None => Err(LedgerError::UnknownTransaction(tx_hash)),
        }
    }
}
