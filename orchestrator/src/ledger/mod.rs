//! # Ledger Boundary
//!
//! The read/write surface the orchestrators consume. A concrete binding
//! (JSON-RPC client, in-memory simulation, test double) implements the four
//! traits below; the core never sees anything more specific than
//! `&dyn Ledger`.
//!
//! ```text
//! TokenLedger: balanceOf, allowance, approve
//! VaultLedger: createGoal, deposit, hasGoal, goals
//! PoolLedger: createPool, joinPool, contributeToPool, getPoolMembers
//! ReceiptLedger: receipt wait and explicit status re-check
//! ```
//!
//! Write methods return as soon as the transaction is *submitted*. Waiting
//! for it to be mined is a separate, timeout-bound step (see
//! [`crate::lifecycle::confirm`]) because only the wait is cancellable:
//! a submitted transaction cannot be withdrawn.

pub mod error;
pub mod events;
pub mod types;

use async_trait::async_trait;

pub use error::LedgerError;
pub use events::{decode_pool_created, PoolEvent, POOL_CREATED_EVENT};
pub use types::{
    Address, CreatePoolCall, ParseError, PaymentAsset, PoolId, PoolMember, PoolRecord, RawLog,
    ReceiptStatus, TokenAmount, TxHash, TxReceipt, TxStatus, VaultRecord,
};

/// Token contract surface.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Token balance of `owner`.
    async fn balance_of(&self, owner: Address) -> Result<TokenAmount, LedgerError>;

    /// Native currency balance of `owner`.
    async fn native_balance_of(&self, owner: Address) -> Result<TokenAmount, LedgerError>;

    /// How much `spender` may currently pull from `owner`.
    async fn allowance(&self, owner: Address, spender: Address)
        -> Result<TokenAmount, LedgerError>;

    /// Submits `approve(spender, amount)` signed by `signer`.
    async fn approve(
        &self,
        signer: Address,
        spender: Address,
        amount: TokenAmount,
    ) -> Result<TxHash, LedgerError>;
}

/// Savings vault contract surface. Vaults are keyed by owner address.
#[async_trait]
pub trait VaultLedger: Send + Sync {
    /// Submits `createGoal(targetAmount, lockDuration, tokenFlag)`.
    async fn create_goal(
        &self,
        signer: Address,
        target_amount: TokenAmount,
        lock_duration_secs: u64,
        token_flag: bool,
    ) -> Result<TxHash, LedgerError>;

    /// Submits `deposit(amount, tokenFlag)`.
    async fn deposit(
        &self,
        signer: Address,
        amount: TokenAmount,
        token_flag: bool,
    ) -> Result<TxHash, LedgerError>;

    /// Whether `owner` has an active vault.
    async fn has_goal(&self, owner: Address) -> Result<bool, LedgerError>;

    /// The vault owned by `owner`, if one was ever created.
    async fn goal(&self, owner: Address) -> Result<Option<VaultRecord>, LedgerError>;
}

/// Group pool contract surface.
#[async_trait]
pub trait PoolLedger: Send + Sync {
    /// Submits `createPool(...)`. The pool id is only available from the
    /// receipt's `PoolCreated` event.
    async fn create_pool(&self, signer: Address, call: &CreatePoolCall)
        -> Result<TxHash, LedgerError>;

    /// Submits `joinPool(poolId, amount, tokenFlag, referrer)`. Registers
    /// membership and transfers the first contribution atomically.
    async fn join_pool(
        &self,
        signer: Address,
        pool_id: PoolId,
        amount: TokenAmount,
        token_flag: bool,
        referrer: Address,
    ) -> Result<TxHash, LedgerError>;

    /// Submits `contributeToPool(poolId, amount, tokenFlag)`. Members only.
    async fn contribute_to_pool(
        &self,
        signer: Address,
        pool_id: PoolId,
        amount: TokenAmount,
        token_flag: bool,
    ) -> Result<TxHash, LedgerError>;

    /// Current member addresses of `pool_id`.
    async fn pool_members(&self, pool_id: PoolId) -> Result<Vec<Address>, LedgerError>;

    /// The pool record, if the id exists.
    async fn pool(&self, pool_id: PoolId) -> Result<Option<PoolRecord>, LedgerError>;
}

/// Receipt retrieval.
#[async_trait]
pub trait ReceiptLedger: Send + Sync {
    /// Resolves once `tx_hash` is mined. Callers bound this with a timeout.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, LedgerError>;

    /// One-shot status query. Used after a confirmation timeout to find out
    /// whether the transaction landed before anything is retried.
    async fn transaction_status(&self, tx_hash: TxHash) -> Result<TxStatus, LedgerError>;
}

/// Everything a session needs from the ledger.
pub trait Ledger: TokenLedger + VaultLedger + PoolLedger + ReceiptLedger {}

impl<T> Ledger for T where T: TokenLedger + VaultLedger + PoolLedger + ReceiptLedger + ?Sized {}
