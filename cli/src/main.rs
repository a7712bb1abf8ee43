// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Savings CLI
//!
//! Entry point for the `savings` binary. Parses CLI arguments, initializes
//! logging and drives the orchestration layer.
//!
//! - `simulate`:   scripted session against the simulated chain
//! - `check-goal`: local `createGoal` parameter check
//! - `check-pool`: local `createPool` parameter check
//! - `version`:    print build version information
//!
//! Every operation prints one JSON line on stdout:
//! `{"step": ..., "report": {"success": ..., "status": ..., ...}}`.

mod cli;
mod logging;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use serde::Serialize;
use serde_json::json;

use savings_contracts::{SimulatedChain, DEFAULT_CONTRACTS};
use savings_orchestrator::ledger::{Address, TokenAmount};
use savings_orchestrator::pool::CreatePoolRequest;
use savings_orchestrator::reconcile::InMemoryMirror;
use savings_orchestrator::validation::{validate_goal, validate_pool};
use savings_orchestrator::{
    ErrorKind, OperationReport, OrchestratorConfig, OrchestratorMetrics, SavingsService,
};

use cli::{Commands, SavingsCli};
use logging::LogFormat;

/// Simulated accounts.
const ALICE: Address = Address::repeat_byte(0xa1);
const BOB: Address = Address::repeat_byte(0xb0);
const CAROL: Address = Address::repeat_byte(0xc4);

/// Tokens and native currency minted to each simulated account.
const STARTING_BALANCE: TokenAmount = TokenAmount::from_whole(500);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = SavingsCli::parse();

    match cli.command {
        Commands::Simulate(args) => simulate(cli.config.as_deref(), args).await,
        Commands::CheckGoal(args) => {
            logging::init_logging("savings=warn", LogFormat::Pretty);
            check_goal(args)
        }
        Commands::CheckPool(args) => {
            logging::init_logging("savings=warn", LogFormat::Pretty);
            check_pool(args)
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig> {
    match path {
        Some(path) => OrchestratorConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(OrchestratorConfig::new(DEFAULT_CONTRACTS)),
    }
}

fn emit<T: Serialize>(step: &str, result: Result<T, ErrorKind>) -> Result<()> {
    let report = OperationReport::from(result);
    let line = serde_json::to_string(&json!({ "step": step, "report": report }))
        .with_context(|| format!("failed to encode report for {step}"))?;
    println!("{line}");
    Ok(())
}

/// Runs a scripted session: one vault, one pool, three savers.
async fn simulate(config_path: Option<&Path>, args: cli::SimulateArgs) -> Result<()> {
    logging::init_logging(
        "savings=info,savings_orchestrator=info,savings_contracts=warn",
        LogFormat::from_json_flag(args.json_log),
    );

    let config = load_config(config_path)?;
    tracing::info!(
        vault = %config.contracts.vault,
        pool = %config.contracts.pool,
        asset = ?config.payment_asset,
        timeout_ms = config.confirmation_timeout_ms,
        "starting simulated session"
    );

    let chain = SimulatedChain::new(config.contracts);
    for account in [ALICE, BOB, CAROL] {
        chain.mint(account, STARTING_BALANCE);
        chain.fund_native(account, STARTING_BALANCE);
    }

    let mirror = Arc::new(InMemoryMirror::new());
    mirror.set_unreachable(args.mirror_outage);
    let metrics =
        Arc::new(OrchestratorMetrics::new().context("failed to register orchestrator metrics")?);
    let service = SavingsService::new(config, mirror.clone(), Arc::clone(&metrics));

    let alice = chain.session(ALICE);
    let bob = chain.session(BOB);
    let carol = chain.session(CAROL);
    let now = Utc::now();

    // --- Vault ---
    let goal = service
        .vault()
        .create_goal(&alice, TokenAmount::from_whole(100), now + Duration::days(90))
        .await;
    emit("alice.create_goal", goal)?;

    let deposit = service
        .deposit_and_reconcile(&alice, TokenAmount::from_whole(25))
        .await;
    emit("alice.deposit", deposit)?;

    // The vault keeps the running goal; this one is expected to revert.
    let second_goal = service
        .vault()
        .create_goal(&alice, TokenAmount::from_whole(50), now + Duration::days(30))
        .await;
    emit("alice.create_goal_again", second_goal)?;

    // --- Pool ---
    let request = CreatePoolRequest {
        name: "Road trip".into(),
        description: "Fuel and a cabin".into(),
        target_amount: TokenAmount::from_whole(300),
        max_members: 3,
        deadline: now + Duration::days(60),
    };
    let created = service.pools().create_pool(&bob, &request).await;
    let pool_id = created.as_ref().ok().map(|creation| creation.pool_id);
    emit("bob.create_pool", created)?;

    if let Some(pool_id) = pool_id {
        let steps = [
            ("alice.join_pool", &alice, TokenAmount::from_whole(40), Some(BOB)),
            ("carol.join_pool", &carol, TokenAmount::from_whole(15), None),
            ("alice.top_up_pool", &alice, TokenAmount::from_whole(10), None),
        ];
        for (step, session, amount, referrer) in steps {
            let result = service
                .contribute_and_reconcile(session, pool_id, amount, referrer)
                .await;
            emit(step, result)?;
        }
    }

    if args.mirror_outage {
        mirror.set_unreachable(false);
        let sweep = service.reconciler().retry_pending().await;
        emit("mirror.sweep", Ok(sweep))?;
    }

    if args.metrics {
        let encoded = metrics.encode().context("failed to encode metrics")?;
        print!("{encoded}");
    }

    tracing::info!(blocks = chain.block_number(), "simulated session finished");
    Ok(())
}

/// `now` plus `days`, rejecting windows chrono cannot represent.
fn deadline_in(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|window| now.checked_add_signed(window))
        .with_context(|| format!("--days {days} is out of range"))
}

fn check_goal(args: cli::CheckGoalArgs) -> Result<()> {
    let now = Utc::now();
    let result = validate_goal(args.target, deadline_in(now, args.days)?, now);
    emit("check_goal", result)
}

fn check_pool(args: cli::CheckPoolArgs) -> Result<()> {
    let now = Utc::now();
    let result = validate_pool(
        &args.name,
        args.target,
        args.max_members,
        deadline_in(now, args.days)?,
        now,
    )
    .map(|lock_duration_secs| json!({ "lockDurationSecs": lock_duration_secs }));
    emit("check_pool", result)
}

/// Prints version information to stdout.
fn print_version() {
    println!("savings {}", env!("CARGO_PKG_VERSION"));
    println!("rustc   {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
