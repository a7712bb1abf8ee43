//! # CLI Interface
//!
//! Defines the command-line argument structure for `savings` using `clap`
//! derive. Subcommands: `simulate`, `check-goal`, `check-pool` and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use savings_orchestrator::ledger::TokenAmount;

/// Savings vault and group pool orchestrator.
///
/// Drives the orchestration layer against an in-process simulated chain,
/// and checks goal or pool parameters the way the orchestrator would
/// before submitting anything.
#[derive(Parser, Debug)]
#[command(
    name = "savings",
    about = "Savings vault and group pool orchestrator",
    version,
    propagate_version = true
)]
pub struct SavingsCli {
    /// Orchestrator configuration file (JSON).
    ///
    /// When omitted, the simulated chain's default deployment is used.
    #[arg(long, short = 'c', global = true, env = "SAVINGS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scripted savings session against the simulated chain and
    /// print one JSON report per operation.
    Simulate(SimulateArgs),
    /// Check `createGoal` parameters without submitting anything.
    CheckGoal(CheckGoalArgs),
    /// Check `createPool` parameters without submitting anything.
    CheckPool(CheckPoolArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `simulate` subcommand.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Print the Prometheus metrics snapshot after the run.
    #[arg(long)]
    pub metrics: bool,

    /// Emit logs as JSON lines instead of pretty text.
    #[arg(long)]
    pub json_log: bool,

    /// Keep the mirror offline for the run so transfers end mirror-pending,
    /// then bring it back and sweep.
    #[arg(long)]
    pub mirror_outage: bool,
}

/// Arguments for the `check-goal` subcommand.
#[derive(Parser, Debug)]
pub struct CheckGoalArgs {
    /// Savings target in whole or decimal tokens, e.g. `12.5`.
    #[arg(long)]
    pub target: TokenAmount,

    /// Lock window in days from now.
    #[arg(long)]
    pub days: i64,
}

/// Arguments for the `check-pool` subcommand.
#[derive(Parser, Debug)]
pub struct CheckPoolArgs {
    /// Pool display name.
    #[arg(long)]
    pub name: String,

    /// Pool target in whole or decimal tokens.
    #[arg(long)]
    pub target: TokenAmount,

    /// Member cap.
    #[arg(long)]
    pub max_members: u32,

    /// Lock window in days from now.
    #[arg(long)]
    pub days: i64,
}
