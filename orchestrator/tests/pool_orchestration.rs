//! Pool orchestration against the recording ledger double: creation with
//! event decoding, and the join-vs-contribute branch.

mod common;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use savings_orchestrator::ledger::{Address, PoolId};
use savings_orchestrator::pool::{ContributionPath, CreatePoolRequest};
use savings_orchestrator::sequencer::AddressSequencer;
use savings_orchestrator::{ErrorKind, PoolOrchestrator};

use common::*;

const POOL_ID: PoolId = PoolId(1);

fn orchestrator() -> PoolOrchestrator {
    PoolOrchestrator::new(
        Arc::new(config()),
        Arc::new(AddressSequencer::new()),
        metrics(),
    )
}

fn request(now: DateTime<Utc>) -> CreatePoolRequest {
    CreatePoolRequest {
        name: "Trip to Lisbon".into(),
        description: "Flights and a week of pastéis".into(),
        target_amount: tokens(500),
        max_members: 5,
        deadline: now + Duration::days(90),
    }
}

/// ALICE holding ten tokens, pool 1 with the given members.
fn ledger_with_members(members: Vec<Address>) -> Arc<MockLedger> {
    let ledger = MockLedger::new();
    ledger.set_balance(ALICE, tokens(10));
    ledger.set_members(POOL_ID, members);
    ledger
}

// ---------------------------------------------------------------------------
// createPool
// ---------------------------------------------------------------------------

#[tokio::test]
async fn created_pool_id_comes_from_the_event() {
    let ledger = MockLedger::new();
    let now = Utc::now();

    let created = orchestrator()
        .create_pool_at(&ledger.session(ALICE), &request(now), now)
        .await
        .unwrap();

    assert_eq!(created.pool_id, PoolId(1));
    assert_eq!(
        ledger.writes(),
        vec![Call::CreatePool {
            name: "Trip to Lisbon".into(),
            max_members: 5,
        }]
    );
}

#[tokio::test]
async fn pool_bounds_are_checked_locally() {
    let ledger = MockLedger::new();
    let pools = orchestrator();
    let session = ledger.session(ALICE);
    let now = Utc::now();

    let cases = vec![
        CreatePoolRequest {
            target_amount: amount("0.05"),
            ..request(now)
        },
        CreatePoolRequest {
            target_amount: tokens(10_001),
            ..request(now)
        },
        CreatePoolRequest {
            max_members: 1,
            ..request(now)
        },
        CreatePoolRequest {
            max_members: 51,
            ..request(now)
        },
        CreatePoolRequest {
            deadline: now + Duration::days(3),
            ..request(now)
        },
        CreatePoolRequest {
            name: "   ".into(),
            ..request(now)
        },
    ];

    for case in &cases {
        let result = pools.create_pool_at(&session, case, now).await;
        assert!(
            matches!(result, Err(ErrorKind::InvalidParameters(_))),
            "{case:?} should be rejected"
        );
    }
    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn missing_creation_event_is_a_revert() {
    let ledger = MockLedger::new();
    ledger.omit_pool_event();
    let now = Utc::now();

    let err = orchestrator()
        .create_pool_at(&ledger.session(ALICE), &request(now), now)
        .await
        .unwrap_err();

    match err {
        ErrorKind::ContractReverted { tx_hash, reason } => {
            assert!(tx_hash.is_some());
            assert!(reason.contains("PoolCreated"));
        }
        other => panic!("expected ContractReverted, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// contribute
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_member_joins() {
    let ledger = ledger_with_members(vec![BOB]);

    let contribution = orchestrator()
        .contribute(&ledger.session(ALICE), POOL_ID, tokens(1))
        .await
        .unwrap();

    assert_eq!(contribution.path, ContributionPath::Join);
    assert_eq!(
        ledger.writes(),
        vec![
            Call::Approve {
                spender: POOL,
                amount: tokens(1),
            },
            Call::JoinPool {
                pool_id: POOL_ID,
                amount: tokens(1),
                referrer: Address::ZERO,
            },
        ]
    );
}

#[tokio::test]
async fn member_contributes() {
    let ledger = ledger_with_members(vec![BOB, ALICE]);
    ledger.set_allowance(ALICE, POOL, tokens(1));

    let contribution = orchestrator()
        .contribute(&ledger.session(ALICE), POOL_ID, tokens(1))
        .await
        .unwrap();

    assert_eq!(contribution.path, ContributionPath::Contribute);
    assert_eq!(
        ledger.writes(),
        vec![Call::ContributeToPool {
            pool_id: POOL_ID,
            amount: tokens(1),
        }]
    );
}

#[tokio::test]
async fn membership_check_ignores_address_case() {
    let checksummed: Address = "0xA1a1A1a1A1a1A1a1A1a1A1a1A1a1A1a1A1a1A1a1".parse().unwrap();
    let ledger = ledger_with_members(vec![checksummed]);
    ledger.set_allowance(ALICE, POOL, tokens(1));

    let contribution = orchestrator()
        .contribute(&ledger.session(ALICE), POOL_ID, tokens(1))
        .await
        .unwrap();

    assert_eq!(contribution.path, ContributionPath::Contribute);
}

#[tokio::test]
async fn referrer_is_passed_on_join_only() {
    let pools = orchestrator();

    let ledger = ledger_with_members(vec![]);
    ledger.set_allowance(ALICE, POOL, tokens(2));
    pools
        .contribute_with_referrer(&ledger.session(ALICE), POOL_ID, tokens(1), Some(BOB))
        .await
        .unwrap();
    assert!(ledger.writes().contains(&Call::JoinPool {
        pool_id: POOL_ID,
        amount: tokens(1),
        referrer: BOB,
    }));

    let ledger = ledger_with_members(vec![ALICE]);
    ledger.set_allowance(ALICE, POOL, tokens(2));
    let contribution = pools
        .contribute_with_referrer(&ledger.session(ALICE), POOL_ID, tokens(1), Some(BOB))
        .await
        .unwrap();
    assert_eq!(contribution.path, ContributionPath::Contribute);
}

#[tokio::test]
async fn contribution_over_balance_submits_nothing() {
    let ledger = ledger_with_members(vec![]);

    let err = orchestrator()
        .contribute(&ledger.session(ALICE), POOL_ID, tokens(11))
        .await
        .unwrap_err();

    assert!(matches!(err, ErrorKind::InsufficientBalance { .. }));
    assert!(ledger.writes().is_empty());
}

#[tokio::test]
async fn full_pool_at_write_time_is_not_retried() {
    let ledger = ledger_with_members(vec![BOB]);
    ledger.set_allowance(ALICE, POOL, tokens(1));
    ledger.revert("join_pool", "PoolFull");

    let err = orchestrator()
        .contribute(&ledger.session(ALICE), POOL_ID, tokens(1))
        .await
        .unwrap_err();

    assert_eq!(err, ErrorKind::PoolFull(POOL_ID));
    assert_eq!(ledger.writes().len(), 1);
    assert!(!ledger
        .writes()
        .iter()
        .any(|c| matches!(c, Call::ContributeToPool { .. })));
}

#[tokio::test]
async fn concurrent_join_surfaces_already_member() {
    // The member list said "not a member"; someone else's join for the same
    // address landed first.
    let ledger = ledger_with_members(vec![]);
    ledger.set_allowance(ALICE, POOL, tokens(1));
    ledger.revert("join_pool", "execution reverted: AlreadyMember()");

    let err = orchestrator()
        .contribute(&ledger.session(ALICE), POOL_ID, tokens(1))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ErrorKind::AlreadyMember {
            pool_id: POOL_ID,
            address: ALICE,
        }
    );
    assert!(!ledger
        .writes()
        .iter()
        .any(|c| matches!(c, Call::ContributeToPool { .. })));
}

#[tokio::test]
async fn removed_member_surfaces_not_a_member() {
    let ledger = ledger_with_members(vec![ALICE]);
    ledger.set_allowance(ALICE, POOL, tokens(1));
    ledger.revert("contribute_to_pool", "Not a member");

    let err = orchestrator()
        .contribute(&ledger.session(ALICE), POOL_ID, tokens(1))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ErrorKind::NotAMember {
            pool_id: POOL_ID,
            address: ALICE,
        }
    );
    assert!(!ledger
        .writes()
        .iter()
        .any(|c| matches!(c, Call::JoinPool { .. })));
}

#[tokio::test]
async fn unknown_revert_keeps_the_raw_reason() {
    let ledger = ledger_with_members(vec![ALICE]);
    ledger.set_allowance(ALICE, POOL, tokens(1));
    ledger.revert("contribute_to_pool", "PoolLocked(1)");

    let err = orchestrator()
        .contribute(&ledger.session(ALICE), POOL_ID, tokens(1))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ErrorKind::ContractReverted { ref reason, .. } if reason == "PoolLocked(1)"
    ));
}

#[tokio::test]
async fn signer_rejection_on_contribute() {
    let ledger = ledger_with_members(vec![ALICE]);
    ledger.set_allowance(ALICE, POOL, tokens(1));
    ledger.reject_signatures();

    let err = orchestrator()
        .contribute(&ledger.session(ALICE), POOL_ID, tokens(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ErrorKind::UserRejected(_)));
}

#[tokio::test]
async fn member_list_read_goes_through_the_orchestrator() {
    let ledger = ledger_with_members(vec![ALICE, BOB]);
    let members = orchestrator()
        .members(&ledger.session(BOB), POOL_ID)
        .await
        .unwrap();
    assert_eq!(members, vec![ALICE, BOB]);
    assert_eq!(ledger.calls(), vec![Call::PoolMembers(POOL_ID)]);
}
