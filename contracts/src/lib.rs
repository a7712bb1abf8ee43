//! # Savings Contracts (Simulated)
//!
//! In-memory versions of the on-chain contracts the savings orchestrator
//! drives, plus a chain that hosts them behind the orchestrator's ledger
//! traits:
//!
//! - **Token**: balances, allowances, `transferFrom`, native currency.
//! - **Savings Vault**: one goal per address with a lock window.
//! - **Group Pool**: capped pools, join vs. contribute, referrals.
//! - **Chain**: transactions, blocks, receipts and events, with fault
//!   knobs for rejected signatures, outages and held blocks.
//!
//! ## Design Principles
//!
//! 1. All monetary operations use checked arithmetic.
//! 2. Contracts revert with the same custom error names the deployed
//!    contracts use, so error classification is exercised for real.
//! 3. A reverted transaction changes nothing but the block number.

pub mod chain;
pub mod group_pool;
pub mod savings_vault;
pub mod token;
pub mod wallet;

pub use chain::{SimulatedChain, DEFAULT_CONTRACTS};
pub use wallet::SimulatedWallet;
