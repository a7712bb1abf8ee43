//! Vault orchestration against the recording ledger double.
//!
//! Every test asserts on the exact sequence of ledger calls, because the
//! properties that matter here are about what was *not* sent: no
//! transaction for a request that was bound to fail, no redundant approval,
//! no resubmission after a timeout.

mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use savings_orchestrator::ledger::{PaymentAsset, TxStatus};
use savings_orchestrator::lifecycle::recheck_status;
use savings_orchestrator::sequencer::AddressSequencer;
use savings_orchestrator::{ErrorKind, VaultOrchestrator};

use common::*;

fn orchestrator() -> VaultOrchestrator {
    VaultOrchestrator::new(
        Arc::new(config()),
        Arc::new(AddressSequencer::new()),
        metrics(),
    )
}

/// ALICE with an active vault, ten tokens and no allowance.
fn funded_ledger() -> Arc<MockLedger> {
    let ledger = MockLedger::new();
    ledger.give_goal(ALICE);
    ledger.set_balance(ALICE, tokens(10));
    ledger
}

// ---------------------------------------------------------------------------
// createGoal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn goal_below_minimum_target_makes_no_calls() {
    let ledger = MockLedger::new();
    let vault = orchestrator();
    let now = Utc::now();

    let result = vault
        .create_goal_at(&ledger.session(ALICE), amount("0.005"), now + Duration::days(30), now)
        .await;

    assert!(matches!(result, Err(ErrorKind::InvalidParameters(_))));
    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn goal_bounds_are_checked_locally() {
    let ledger = MockLedger::new();
    let vault = orchestrator();
    let session = ledger.session(ALICE);
    let now = Utc::now();

    let rejected = [
        (amount("1000.01"), now + Duration::days(30)),
        (tokens(1), now + Duration::days(6)),
        (tokens(1), now + Duration::days(366)),
        (tokens(1), now - Duration::days(1)),
    ];
    for (target, deadline) in rejected {
        let result = vault.create_goal_at(&session, target, deadline, now).await;
        assert!(
            matches!(result, Err(ErrorKind::InvalidParameters(_))),
            "target {target} deadline {deadline} should be rejected"
        );
    }
    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn goal_at_the_bounds_is_submitted() {
    let ledger = MockLedger::new();
    let vault = orchestrator();
    let session = ledger.session(ALICE);
    let now = Utc::now();

    vault
        .create_goal_at(&session, amount("0.01"), now + Duration::days(7), now)
        .await
        .unwrap();
    let confirmation = vault
        .create_goal_at(&session, tokens(1000), now + Duration::days(365), now)
        .await
        .unwrap();

    assert_eq!(
        ledger.writes(),
        vec![
            Call::CreateGoal {
                target: amount("0.01"),
                lock_secs: 7 * 86_400,
            },
            Call::CreateGoal {
                target: tokens(1000),
                lock_secs: 365 * 86_400,
            },
        ]
    );
    assert_eq!(confirmation.block_number, 2);
}

#[tokio::test]
async fn second_goal_revert_is_surfaced_verbatim() {
    let ledger = MockLedger::new();
    ledger.revert("create_goal", "GoalAlreadyActive");
    let vault = orchestrator();
    let now = Utc::now();

    let err = vault
        .create_goal_at(&ledger.session(ALICE), tokens(5), now + Duration::days(30), now)
        .await
        .unwrap_err();

    match err {
        ErrorKind::ContractReverted { tx_hash, reason } => {
            assert!(tx_hash.is_some());
            assert_eq!(reason, "GoalAlreadyActive");
        }
        other => panic!("expected ContractReverted, got {other:?}"),
    }
    // No hasGoal pre-check on creation.
    assert!(!ledger.calls().contains(&Call::HasGoal(ALICE)));
}

// ---------------------------------------------------------------------------
// deposit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deposit_without_allowance_approves_then_deposits() {
    let ledger = funded_ledger();
    let vault = orchestrator();

    vault.deposit(&ledger.session(ALICE), tokens(2)).await.unwrap();

    assert_eq!(
        ledger.writes(),
        vec![
            Call::Approve {
                spender: VAULT,
                amount: tokens(2),
            },
            Call::Deposit { amount: tokens(2) },
        ]
    );
    assert_eq!(
        ledger.calls()[..3],
        [
            Call::HasGoal(ALICE),
            Call::BalanceOf(ALICE),
            Call::Allowance {
                owner: ALICE,
                spender: VAULT,
            },
        ]
    );
    assert_eq!(ledger.allowance_of(ALICE, VAULT), tokens(2));
}

#[tokio::test]
async fn sufficient_allowance_skips_approval() {
    let ledger = funded_ledger();
    ledger.set_allowance(ALICE, VAULT, tokens(5));
    let metrics = metrics();
    let vault = VaultOrchestrator::new(
        Arc::new(config()),
        Arc::new(AddressSequencer::new()),
        Arc::clone(&metrics),
    );

    vault.deposit(&ledger.session(ALICE), tokens(5)).await.unwrap();

    assert_eq!(ledger.writes(), vec![Call::Deposit { amount: tokens(5) }]);
    assert_eq!(
        metrics
            .allowance_checks_total
            .with_label_values(&["skipped"])
            .get(),
        1
    );
}

#[tokio::test]
async fn deposit_exceeding_balance_submits_nothing() {
    let ledger = MockLedger::new();
    ledger.give_goal(ALICE);
    ledger.set_balance(ALICE, amount("0.5"));
    let vault = orchestrator();

    let err = vault
        .deposit(&ledger.session(ALICE), tokens(2))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ErrorKind::InsufficientBalance {
            required: tokens(2),
            available: Some(amount("0.5")),
        }
    );
    assert!(ledger.writes().is_empty());
}

#[tokio::test]
async fn deposit_without_vault_stops_after_lookup() {
    let ledger = MockLedger::new();
    ledger.set_balance(ALICE, tokens(10));
    let vault = orchestrator();

    let err = vault
        .deposit(&ledger.session(ALICE), tokens(1))
        .await
        .unwrap_err();

    assert_eq!(err, ErrorKind::NoActiveVault(ALICE));
    assert_eq!(ledger.calls(), vec![Call::HasGoal(ALICE)]);
}

#[tokio::test]
async fn zero_deposit_is_invalid() {
    let ledger = funded_ledger();
    let err = orchestrator()
        .deposit(&ledger.session(ALICE), tokens(0))
        .await
        .unwrap_err();
    assert!(matches!(err, ErrorKind::InvalidParameters(_)));
    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn rejected_approval_never_reaches_deposit() {
    let ledger = funded_ledger();
    ledger.reject_signatures();

    let err = orchestrator()
        .deposit(&ledger.session(ALICE), tokens(2))
        .await
        .unwrap_err();

    assert!(matches!(err, ErrorKind::UserRejected(_)));
    assert_eq!(
        ledger.writes(),
        vec![Call::Approve {
            spender: VAULT,
            amount: tokens(2),
        }]
    );
}

#[tokio::test]
async fn reverted_approval_is_insufficient_allowance() {
    let ledger = funded_ledger();
    ledger.revert("approve", "ERC20: approve to the zero address");

    let err = orchestrator()
        .deposit(&ledger.session(ALICE), tokens(2))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ErrorKind::InsufficientAllowance { required, .. } if required == tokens(2)
    ));
    assert!(!ledger.writes().contains(&Call::Deposit { amount: tokens(2) }));
}

#[tokio::test]
async fn write_time_missing_goal_is_no_active_vault() {
    let ledger = funded_ledger();
    ledger.set_allowance(ALICE, VAULT, tokens(2));
    ledger.revert("deposit", "execution reverted: NoActiveGoal");

    let err = orchestrator()
        .deposit(&ledger.session(ALICE), tokens(2))
        .await
        .unwrap_err();

    assert_eq!(err, ErrorKind::NoActiveVault(ALICE));
}

#[tokio::test]
async fn native_deposit_checks_native_balance_and_skips_allowance() {
    let ledger = MockLedger::new();
    ledger.give_goal(ALICE);
    ledger.set_native_balance(ALICE, tokens(3));
    let vault = VaultOrchestrator::new(
        Arc::new(config().with_payment_asset(PaymentAsset::Native)),
        Arc::new(AddressSequencer::new()),
        metrics(),
    );

    vault.deposit(&ledger.session(ALICE), tokens(3)).await.unwrap();

    let calls = ledger.calls();
    assert!(calls.contains(&Call::NativeBalanceOf(ALICE)));
    assert!(!calls.iter().any(|c| matches!(c, Call::Allowance { .. } | Call::Approve { .. })));
    assert_eq!(ledger.writes(), vec![Call::Deposit { amount: tokens(3) }]);
}

#[tokio::test]
async fn unreachable_ledger_is_reported_before_any_write() {
    let ledger = funded_ledger();
    ledger.take_reads_down();

    let err = orchestrator()
        .deposit(&ledger.session(ALICE), tokens(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ErrorKind::LedgerUnavailable(_)));
    assert!(ledger.writes().is_empty());
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn confirmation_timeout_requires_recheck_not_resubmission() {
    let ledger = funded_ledger();
    ledger.set_allowance(ALICE, VAULT, tokens(2));
    ledger.hold_receipts(true);
    let session = ledger.session(ALICE);

    let err = orchestrator().deposit(&session, tokens(2)).await.unwrap_err();

    assert!(err.requires_status_recheck());
    let tx_hash = err.tx_hash().unwrap();
    assert_eq!(ledger.writes(), vec![Call::Deposit { amount: tokens(2) }]);

    let status = recheck_status(session.ledger(), tx_hash).await.unwrap();
    assert_eq!(status, TxStatus::Pending);

    ledger.hold_receipts(false);
    let status = recheck_status(session.ledger(), tx_hash).await.unwrap();
    assert!(matches!(status, TxStatus::Confirmed(receipt) if receipt.tx_hash == tx_hash));
    assert_eq!(ledger.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn approval_timeout_stays_a_timeout() {
    let ledger = funded_ledger();
    ledger.hold_receipts(true);

    let err = orchestrator()
        .deposit(&ledger.session(ALICE), tokens(2))
        .await
        .unwrap_err();

    assert!(matches!(err, ErrorKind::NetworkTimeout { .. }));
    assert_eq!(
        ledger.writes(),
        vec![Call::Approve {
            spender: VAULT,
            amount: tokens(2),
        }]
    );
}

#[tokio::test]
async fn recheck_of_unknown_hash_is_unknown() {
    let ledger = MockLedger::new();
    let session = ledger.session(ALICE);
    let status = recheck_status(
        session.ledger(),
        savings_orchestrator::TxHash::from_bytes([0xee; 32]),
    )
    .await
    .unwrap();
    assert_eq!(status, TxStatus::Unknown);
}

// ---------------------------------------------------------------------------
// Sequencing
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn same_address_waits_for_the_unconfirmed_transaction() {
    let ledger = funded_ledger();
    ledger.set_allowance(ALICE, VAULT, tokens(10));
    ledger.give_goal(BOB);
    ledger.set_balance(BOB, tokens(10));
    ledger.set_allowance(BOB, VAULT, tokens(10));
    ledger.hold_receipts(true);
    let vault = Arc::new(orchestrator());

    let spawn = |address| {
        let vault = Arc::clone(&vault);
        let session = ledger.session(address);
        tokio::spawn(async move { vault.deposit(&session, tokens(1)).await })
    };
    let first = spawn(ALICE);
    let second = spawn(ALICE);
    let other = spawn(BOB);

    // Well inside the 5s confirmation bound.
    tokio::time::sleep(StdDuration::from_secs(1)).await;
    assert_eq!(ledger.writes().len(), 2, "ALICE's second deposit must wait");

    let results: Vec<_> = futures::future::join_all([first, second, other])
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap_err())
        .collect();
    for err in &results {
        assert!(matches!(err, ErrorKind::NetworkTimeout { .. }), "{err:?}");
    }
    // The waiting call found ALICE's deposit still pending and reported it
    // instead of sending its own.
    assert_eq!(results[0].tx_hash(), results[1].tx_hash());
    assert_ne!(results[0].tx_hash(), results[2].tx_hash());
    assert_eq!(ledger.writes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn pending_deposit_blocks_the_next_until_it_settles() {
    let ledger = funded_ledger();
    ledger.set_allowance(ALICE, VAULT, tokens(10));
    ledger.hold_receipts(true);
    let session = ledger.session(ALICE);
    let vault = orchestrator();

    let timed_out = vault.deposit(&session, tokens(1)).await.unwrap_err();
    let tx_hash = timed_out.tx_hash().unwrap();
    assert_eq!(
        recheck_status(session.ledger(), tx_hash).await.unwrap(),
        TxStatus::Pending
    );

    let refused = vault.deposit(&session, tokens(1)).await.unwrap_err();
    assert!(matches!(refused, ErrorKind::NetworkTimeout { .. }));
    assert_eq!(refused.tx_hash(), Some(tx_hash));
    assert_eq!(ledger.writes(), vec![Call::Deposit { amount: tokens(1) }]);

    // Once the first deposit lands, the next one goes through.
    ledger.hold_receipts(false);
    vault.deposit(&session, tokens(1)).await.unwrap();
    assert_eq!(
        ledger.writes(),
        vec![
            Call::Deposit { amount: tokens(1) },
            Call::Deposit { amount: tokens(1) },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn pending_transaction_is_shared_across_orchestrators() {
    let ledger = funded_ledger();
    ledger.set_allowance(ALICE, VAULT, tokens(10));
    ledger.hold_receipts(true);
    let session = ledger.session(ALICE);
    let sequencer = Arc::new(AddressSequencer::new());
    let build = || VaultOrchestrator::new(Arc::new(config()), Arc::clone(&sequencer), metrics());

    let tx_hash = build()
        .deposit(&session, tokens(1))
        .await
        .unwrap_err()
        .tx_hash()
        .unwrap();
    assert_eq!(sequencer.outstanding(ALICE), Some(tx_hash));

    let refused = build().deposit(&session, tokens(1)).await.unwrap_err();
    assert_eq!(refused.tx_hash(), Some(tx_hash));
    assert_eq!(ledger.writes().len(), 1);
    assert_eq!(sequencer.outstanding(ALICE), Some(tx_hash));
    assert_eq!(sequencer.lane_count(), 0);
}
