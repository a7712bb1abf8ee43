//! # Savings Token Contract
//!
//! A minimal ERC-20 style ledger: balances, allowances and `transferFrom`.
//! Native currency balances are tracked alongside so contracts can accept
//! either payment asset.
//!
//! Allowances are consumed by `transferFrom`, exactly like the real token:
//! an approval for 2 covers one deposit of 2 and nothing after it.

use std::collections::HashMap;

use thiserror::Error;

use savings_orchestrator::ledger::{Address, TokenAmount};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by token operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The sender does not hold enough tokens.
    #[error("insufficient balance: account has {balance}, tried to move {amount}")]
    InsufficientBalance {
        /// Current balance of the sender.
        balance: TokenAmount,
        /// Amount the caller tried to move.
        amount: TokenAmount,
    },

    /// The spender's allowance does not cover the transfer.
    #[error("insufficient allowance: spender may move {allowance}, tried {amount}")]
    InsufficientAllowance {
        /// Remaining allowance.
        allowance: TokenAmount,
        /// Amount the spender tried to move.
        amount: TokenAmount,
    },

    /// A balance would exceed `u128::MAX` base units.
    #[error("balance overflow")]
    Overflow,
}

impl TokenError {
    /// The revert reason a deployed token reports for this error.
    pub fn revert_reason(&self) -> &'static str {
        match self {
            TokenError::InsufficientBalance { .. } => "ERC20InsufficientBalance",
            TokenError::InsufficientAllowance { .. } => "ERC20InsufficientAllowance",
            TokenError::Overflow => "Panic(0x11)",
        }
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// Token and native balances for every simulated account.
#[derive(Debug, Clone, Default)]
pub struct Token {
    balances: HashMap<Address, TokenAmount>,
    native_balances: HashMap<Address, TokenAmount>,
    /// `(owner, spender) -> remaining allowance`
    allowances: HashMap<(Address, Address), TokenAmount>,
    total_supply: TokenAmount,
}

impl Token {
    /// An empty token with no supply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `amount` new tokens in `to`'s account.
    pub fn mint(&mut self, to: Address, amount: TokenAmount) -> Result<(), TokenError> {
        let total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        credit(&mut self.balances, to, amount)?;
        self.total_supply = total_supply;
        Ok(())
    }

    /// Credits native currency to `to`.
    pub fn fund_native(&mut self, to: Address, amount: TokenAmount) -> Result<(), TokenError> {
        credit(&mut self.native_balances, to, amount)
    }

    pub fn balance_of(&self, owner: Address) -> TokenAmount {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    pub fn native_balance_of(&self, owner: Address) -> TokenAmount {
        self.native_balances.get(&owner).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> TokenAmount {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn total_supply(&self) -> TokenAmount {
        self.total_supply
    }

    /// Sets `spender`'s allowance over `owner`'s tokens. Replaces, never
    /// adds to, the previous value.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: TokenAmount) {
        self.allowances.insert((owner, spender), amount);
    }

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: TokenAmount,
    ) -> Result<(), TokenError> {
        let allowance = self.allowance(from, spender);
        let remaining = allowance
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientAllowance { allowance, amount })?;
        move_between(&mut self.balances, from, to, amount)?;
        self.allowances.insert((from, spender), remaining);
        Ok(())
    }

    /// Moves native currency attached to a call from `from` to `to`.
    pub fn transfer_native(
        &mut self,
        from: Address,
        to: Address,
        amount: TokenAmount,
    ) -> Result<(), TokenError> {
        move_between(&mut self.native_balances, from, to, amount)
    }
}

fn credit(
    ledger: &mut HashMap<Address, TokenAmount>,
    to: Address,
    amount: TokenAmount,
) -> Result<(), TokenError> {
    let balance = ledger.entry(to).or_default();
    *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
    Ok(())
}

fn move_between(
    ledger: &mut HashMap<Address, TokenAmount>,
    from: Address,
    to: Address,
    amount: TokenAmount,
) -> Result<(), TokenError> {
    let balance = ledger.get(&from).copied().unwrap_or_default();
    let debited = balance
        .checked_sub(amount)
        .ok_or(TokenError::InsufficientBalance { balance, amount })?;
    if from == to {
        return Ok(());
    }
    let credited = ledger
        .get(&to)
        .copied()
        .unwrap_or_default()
        .checked_add(amount)
        .ok_or(TokenError::Overflow)?;
    ledger.insert(from, debited);
    ledger.insert(to, credited);
    Ok(())
}
