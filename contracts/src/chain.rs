//! # Simulated Chain
//!
//! Hosts the token, vault and pool contracts behind the orchestrator's
//! ledger traits, so the real orchestrators can run end to end without a
//! node.
//!
//! Every write becomes a transaction with a blake3 hash. With auto-mining
//! on (the default) it executes immediately in its own block; with it off
//! it waits in the mempool until [`SimulatedChain::mine`]. Execution runs
//! against a scratch copy of contract state, so a revert leaves no trace
//! beyond its receipt.
//!
//! Fault knobs for tests: rejected signers, an offline RPC, and held blocks
//! (auto-mining off) for confirmation timeouts.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use savings_orchestrator::config::ContractAddresses;
use savings_orchestrator::ledger::{
    Address, CreatePoolCall, LedgerError, PoolId, PoolLedger, PoolRecord, RawLog, ReceiptLedger,
    ReceiptStatus, TokenAmount, TokenLedger, TxHash, TxReceipt, TxStatus, VaultLedger,
    VaultRecord, POOL_CREATED_EVENT,
};
use savings_orchestrator::session::Session;

use crate::group_pool::GroupPool;
use crate::savings_vault::SavingsVault;
use crate::token::Token;

/// Default deployment addresses.
pub const DEFAULT_CONTRACTS: ContractAddresses = ContractAddresses {
    token: Address::repeat_byte(0x70),
    vault: Address::repeat_byte(0x7a),
    pool: Address::repeat_byte(0x7b),
};

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// A contract call waiting to be executed.
#[derive(Debug, Clone)]
enum Call {
    Approve {
        spender: Address,
        amount: TokenAmount,
    },
    CreateGoal {
        target_amount: TokenAmount,
        lock_duration_secs: u64,
    },
    Deposit {
        amount: TokenAmount,
        token_flag: bool,
    },
    CreatePool(CreatePoolCall),
    JoinPool {
        pool_id: PoolId,
        amount: TokenAmount,
        token_flag: bool,
        referrer: Address,
    },
    Contribute {
        pool_id: PoolId,
        amount: TokenAmount,
        token_flag: bool,
    },
}

impl Call {
    fn name(&self) -> &'static str {
        match self {
            Call::Approve { .. } => "approve",
            Call::CreateGoal { .. } => "createGoal",
            Call::Deposit { .. } => "deposit",
            Call::CreatePool(_) => "createPool",
            Call::JoinPool { .. } => "joinPool",
            Call::Contribute { .. } => "contributeToPool",
        }
    }
}

#[derive(Debug, Clone)]
struct Transaction {
    hash: TxHash,
    signer: Address,
    call: Call,
}

/// Contract state. Cloned per transaction so reverts are free.
#[derive(Debug, Clone, Default)]
struct Contracts {
    token: Token,
    vault: SavingsVault,
    pools: GroupPool,
}

#[derive(Debug, Default)]
struct ChainState {
    contracts: Contracts,
    mempool: Vec<Transaction>,
    receipts: HashMap<TxHash, TxReceipt>,
    block_number: u64,
    nonce: u64,
    /// Submitted transactions per signer.
    sent: HashMap<Address, u64>,
    rejected_signers: HashSet<Address>,
    offline: bool,
    manual_mining: bool,
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// In-memory chain hosting the savings contracts.
pub struct SimulatedChain {
    addresses: ContractAddresses,
    state: Mutex<ChainState>,
    /// Latest block number; receipt waiters watch it.
    blocks: watch::Sender<u64>,
}

impl SimulatedChain {
    /// A chain with the contracts deployed at `addresses`.
    pub fn new(addresses: ContractAddresses) -> Arc<Self> {
        let (blocks, _) = watch::channel(0);
        Arc::new(Self {
            addresses,
            state: Mutex::new(ChainState::default()),
            blocks,
        })
    }

    /// A chain at [`DEFAULT_CONTRACTS`].
    pub fn with_default_contracts() -> Arc<Self> {
        Self::new(DEFAULT_CONTRACTS)
    }

    pub fn addresses(&self) -> ContractAddresses {
        self.addresses
    }

    /// A session for `address` on this chain.
    pub fn session(self: &Arc<Self>, address: Address) -> Session {
        Session::new(address, self.clone())
    }

    // -- genesis -----------------------------------------------------------

    /// Mints `amount` tokens to `to`.
    pub fn mint(&self, to: Address, amount: TokenAmount) {
        let mut state = self.state.lock();
        if let Err(err) = state.contracts.token.mint(to, amount) {
            warn!(%to, %amount, error = %err, "mint skipped");
        }
    }

    /// Credits native currency to `to`.
    pub fn fund_native(&self, to: Address, amount: TokenAmount) {
        let mut state = self.state.lock();
        if let Err(err) = state.contracts.token.fund_native(to, amount) {
            warn!(%to, %amount, error = %err, "native funding skipped");
        }
    }

    // -- fault knobs -------------------------------------------------------

    /// Makes `signer`'s wallet decline every signature request.
    pub fn reject_signer(&self, signer: Address) {
        self.state.lock().rejected_signers.insert(signer);
    }

    /// Takes the RPC endpoint down (or back up). Every call fails with a
    /// transport error while down.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// With manual mining on, transactions wait in the mempool until
    /// [`mine`](Self::mine).
    pub fn set_manual_mining(&self, manual: bool) {
        self.state.lock().manual_mining = manual;
    }

    /// Executes every mempool transaction, one block each. Returns how
    /// many were mined.
    pub fn mine(&self) -> usize {
        let mut state = self.state.lock();
        let queued = std::mem::take(&mut state.mempool);
        let count = queued.len();
        for tx in queued {
            self.execute(&mut state, tx);
        }
        count
    }

    // -- inspection --------------------------------------------------------

    pub fn token_balance(&self, owner: Address) -> TokenAmount {
        self.state.lock().contracts.token.balance_of(owner)
    }

    pub fn vault_goal(&self, owner: Address) -> Option<VaultRecord> {
        self.state.lock().contracts.vault.goal(owner).cloned()
    }

    pub fn pool_record(&self, pool_id: PoolId) -> Option<PoolRecord> {
        self.state.lock().contracts.pools.pool(pool_id).cloned()
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().block_number
    }

    /// Transactions `signer` has submitted, mined or not.
    pub fn transactions_from(&self, signer: Address) -> u64 {
        self.state
            .lock()
            .sent
            .get(&signer)
            .copied()
            .unwrap_or_default()
    }

    // -- internals ---------------------------------------------------------

    fn check_online(&self) -> Result<parking_lot::MutexGuard<'_, ChainState>, LedgerError> {
        let state = self.state.lock();
        if state.offline {
            return Err(LedgerError::Transport("simulated RPC endpoint offline".into()));
        }
        Ok(state)
    }

    fn submit(&self, signer: Address, call: Call) -> Result<TxHash, LedgerError> {
        let mut state = self.check_online()?;
        if state.rejected_signers.contains(&signer) {
            return Err(LedgerError::SignerRejected(format!(
                "{signer} declined to sign {}",
                call.name()
            )));
        }

        state.nonce += 1;
        *state.sent.entry(signer).or_default() += 1;
        let mut preimage = Vec::with_capacity(8 + 20 + 16);
        preimage.extend_from_slice(&state.nonce.to_be_bytes());
        preimage.extend_from_slice(signer.as_bytes());
        preimage.extend_from_slice(call.name().as_bytes());
        let hash = TxHash::from_bytes(*blake3::hash(&preimage).as_bytes());

        debug!(%signer, tx_hash = %hash, call = call.name(), "transaction submitted");
        let tx = Transaction { hash, signer, call };
        if state.manual_mining {
            state.mempool.push(tx);
        } else {
            self.execute(&mut state, tx);
        }
        Ok(hash)
    }

    fn execute(&self, state: &mut ChainState, tx: Transaction) {
        state.block_number += 1;
        let block_number = state.block_number;

        let mut scratch = state.contracts.clone();
        let mut logs = Vec::new();
        let status = match self.apply(&mut scratch, tx.signer, &tx.call, &mut logs) {
            Ok(()) => {
                state.contracts = scratch;
                ReceiptStatus::Success
            }
            Err(reason) => {
                logs.clear();
                ReceiptStatus::Reverted {
                    reason: Some(reason.to_string()),
                }
            }
        };
        info!(
            tx_hash = %tx.hash,
            block = block_number,
            call = tx.call.name(),
            success = matches!(status, ReceiptStatus::Success),
            "transaction mined"
        );
        state.receipts.insert(
            tx.hash,
            TxReceipt {
                tx_hash: tx.hash,
                block_number,
                status,
                logs,
            },
        );
        self.blocks.send_replace(block_number);
    }

    /// Runs one call against `contracts`. Errors are revert reasons.
    fn apply(
        &self,
        contracts: &mut Contracts,
        signer: Address,
        call: &Call,
        logs: &mut Vec<RawLog>,
    ) -> Result<(), &'static str> {
        let now = Utc::now();
        match call {
            Call::Approve { spender, amount } => {
                contracts.token.approve(signer, *spender, *amount);
                logs.push(self.log(
                    self.addresses.token,
                    "Approval",
                    json!({ "owner": signer, "spender": spender, "value": amount }),
                ));
            }
            Call::CreateGoal {
                target_amount,
                lock_duration_secs,
            } => {
                let goal = contracts
                    .vault
                    .create_goal(signer, *target_amount, *lock_duration_secs, now)
                    .map_err(|e| e.revert_reason())?;
                logs.push(self.log(
                    self.addresses.vault,
                    "GoalCreated",
                    json!({ "owner": signer, "targetAmount": goal.target_amount, "lockEnd": goal.lock_end }),
                ));
            }
            Call::Deposit { amount, token_flag } => {
                if !contracts.vault.has_goal(signer) {
                    return Err("NoActiveGoal");
                }
                self.pull_funds(contracts, signer, self.addresses.vault, *amount, *token_flag)?;
                let total = contracts
                    .vault
                    .record_deposit(signer, *amount)
                    .map_err(|e| e.revert_reason())?;
                logs.push(self.log(
                    self.addresses.vault,
                    "Deposited",
                    json!({ "owner": signer, "amount": amount, "currentAmount": total }),
                ));
            }
            Call::CreatePool(create) => {
                let pool_id = contracts
                    .pools
                    .create_pool(signer, create, now)
                    .map_err(|e| e.revert_reason())?;
                logs.push(self.log(
                    self.addresses.pool,
                    POOL_CREATED_EVENT,
                    json!({ "poolId": pool_id.0, "creator": signer, "name": create.name }),
                ));
            }
            Call::JoinPool {
                pool_id,
                amount,
                token_flag,
                referrer,
            } => {
                contracts
                    .pools
                    .join(*pool_id, signer, *amount, *referrer, now)
                    .map_err(|e| e.revert_reason())?;
                self.pull_funds(contracts, signer, self.addresses.pool, *amount, *token_flag)?;
                logs.push(self.log(
                    self.addresses.pool,
                    "MemberJoined",
                    json!({ "poolId": pool_id.0, "member": signer, "amount": amount }),
                ));
            }
            Call::Contribute {
                pool_id,
                amount,
                token_flag,
            } => {
                contracts
                    .pools
                    .contribute(*pool_id, signer, *amount)
                    .map_err(|e| e.revert_reason())?;
                self.pull_funds(contracts, signer, self.addresses.pool, *amount, *token_flag)?;
                logs.push(self.log(
                    self.addresses.pool,
                    "Contributed",
                    json!({ "poolId": pool_id.0, "member": signer, "amount": amount }),
                ));
            }
        }
        Ok(())
    }

    fn pull_funds(
        &self,
        contracts: &mut Contracts,
        from: Address,
        to: Address,
        amount: TokenAmount,
        token_flag: bool,
    ) -> Result<(), &'static str> {
        let moved = if token_flag {
            contracts.token.transfer_from(to, from, to, amount)
        } else {
            contracts.token.transfer_native(from, to, amount)
        };
        moved.map_err(|e| e.revert_reason())
    }

    fn log(&self, emitter: Address, event: &str, data: serde_json::Value) -> RawLog {
        RawLog {
            emitter,
            event: event.to_string(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger traits
// ---------------------------------------------------------------------------

#[async_trait]
impl TokenLedger for SimulatedChain {
    async fn balance_of(&self, owner: Address) -> Result<TokenAmount, LedgerError> {
        Ok(self.check_online()?.contracts.token.balance_of(owner))
    }

    async fn native_balance_of(&self, owner: Address) -> Result<TokenAmount, LedgerError> {
        Ok(self.check_online()?.contracts.token.native_balance_of(owner))
    }

    async fn allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> Result<TokenAmount, LedgerError> {
        Ok(self.check_online()?.contracts.token.allowance(owner, spender))
    }

    async fn approve(
        &self,
        signer: Address,
        spender: Address,
        amount: TokenAmount,
    ) -> Result<TxHash, LedgerError> {
        self.submit(signer, Call::Approve { spender, amount })
    }
}

#[async_trait]
impl VaultLedger for SimulatedChain {
    async fn create_goal(
        &self,
        signer: Address,
        target_amount: TokenAmount,
        lock_duration_secs: u64,
        _token_flag: bool,
    ) -> Result<TxHash, LedgerError> {
        self.submit(
            signer,
            Call::CreateGoal {
                target_amount,
                lock_duration_secs,
            },
        )
    }

    async fn deposit(
        &self,
        signer: Address,
        amount: TokenAmount,
        token_flag: bool,
    ) -> Result<TxHash, LedgerError> {
        self.submit(signer, Call::Deposit { amount, token_flag })
    }

    async fn has_goal(&self, owner: Address) -> Result<bool, LedgerError> {
        Ok(self.check_online()?.contracts.vault.has_goal(owner))
    }

    async fn goal(&self, owner: Address) -> Result<Option<VaultRecord>, LedgerError> {
        Ok(self.check_online()?.contracts.vault.goal(owner).cloned())
    }
}

#[async_trait]
impl PoolLedger for SimulatedChain {
    async fn create_pool(
        &self,
        signer: Address,
        call: &CreatePoolCall,
    ) -> Result<TxHash, LedgerError> {
        self.submit(signer, Call::CreatePool(call.clone()))
    }

    async fn join_pool(
        &self,
        signer: Address,
        pool_id: PoolId,
        amount: TokenAmount,
        token_flag: bool,
        referrer: Address,
    ) -> Result<TxHash, LedgerError> {
        self.submit(
            signer,
            Call::JoinPool {
                pool_id,
                amount,
                token_flag,
                referrer,
            },
        )
    }

    async fn contribute_to_pool(
        &self,
        signer: Address,
        pool_id: PoolId,
        amount: TokenAmount,
        token_flag: bool,
    ) -> Result<TxHash, LedgerError> {
        self.submit(
            signer,
            Call::Contribute {
                pool_id,
                amount,
                token_flag,
            },
        )
    }

    async fn pool_members(&self, pool_id: PoolId) -> Result<Vec<Address>, LedgerError> {
        Ok(self.check_online()?.contracts.pools.member_addresses(pool_id))
    }

    async fn pool(&self, pool_id: PoolId) -> Result<Option<PoolRecord>, LedgerError> {
        Ok(self.check_online()?.contracts.pools.pool(pool_id).cloned())
    }
}

#[async_trait]
impl ReceiptLedger for SimulatedChain {
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, LedgerError> {
        // Subscribe before looking so a block mined in between still wakes us.
        let mut blocks = self.blocks.subscribe();
        loop {
            {
                let state = self.check_online()?;
                if let Some(receipt) = state.receipts.get(&tx_hash) {
                    return Ok(receipt.clone());
                }
                if !state.mempool.iter().any(|tx| tx.hash == tx_hash) {
                    return Err(LedgerError::UnknownTransaction(tx_hash));
                }
            }
            blocks
                .changed()
                .await
                .map_err(|_| LedgerError::Transport("block feed closed".into()))?;
        }
    }

    async fn transaction_status(&self, tx_hash: TxHash) -> Result<TxStatus, LedgerError> {
        let state = self.check_online()?;
        if let Some(receipt) = state.receipts.get(&tx_hash) {
            return Ok(match &receipt.status {
                ReceiptStatus::Success => TxStatus::Confirmed(receipt.clone()),
                ReceiptStatus::Reverted { reason } => TxStatus::Reverted {
                    reason: reason.clone(),
                },
            });
        }
        if state.mempool.iter().any(|tx| tx.hash == tx_hash) {
            return Ok(TxStatus::Pending);
        }
        Err(LedgerError::UnknownTransaction(tx_hash))
    }
}
