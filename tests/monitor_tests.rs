//! Relay monitor tests: the sweep re-attempts stuck pending signals through
//! the same relay path, isolates per-signal failures, and respects the
//! severity threshold and the disabled flag.

mod common;

use std::sync::Arc;

use sea_orm::EntityTrait;
use watchtower::domain::{Severity, SignalStatus};
use watchtower::models::analysis_result;
use watchtower::oracle::{Ledger, RelayMonitor};

use common::{FakeLedger, LedgerScript, TestHarness};

fn monitor_for(harness: &TestHarness) -> RelayMonitor {
    RelayMonitor::new(
        harness.config.monitor.clone(),
        harness.config.oracle.clone(),
        harness.signals.clone(),
        Arc::clone(&harness.relay),
    )
}

#[tokio::test]
async fn sweep_transmits_stuck_pending_signals() {
    let ledger = Arc::new(FakeLedger::new(LedgerScript::Confirm));
    let harness = common::harness(
        common::test_config(),
        common::unused_extractor(),
        common::unused_analyzer(),
        Some(Arc::clone(&ledger) as Arc<dyn Ledger>),
    )
    .await;

    // Two signals left pending (their queue-triggered jobs never ran).
    let first = common::seed_analysis(&harness.analyses, Severity::High).await;
    let second = common::seed_analysis(&harness.analyses, Severity::Critical).await;
    let signal_a = harness.gate.maybe_signal(&first).await.unwrap().unwrap();
    let signal_b = harness.gate.maybe_signal(&second).await.unwrap().unwrap();

    monitor_for(&harness).sweep().await.unwrap();

    for id in [signal_a.id, signal_b.id] {
        let signal = harness.signals.get(id).await.unwrap();
        assert_eq!(signal.status, SignalStatus::Sent.as_str());
        assert!(signal.tx_confirmed);
    }
    assert_eq!(ledger.submission_count(), 2);
}

#[tokio::test]
async fn one_failing_signal_does_not_halt_the_sweep() {
    // First submission (oldest signal) errors at the gateway; the second
    // confirms.
    let ledger = Arc::new(
        FakeLedger::new(LedgerScript::Confirm)
            .with_scripts(vec![LedgerScript::SubmitError, LedgerScript::Confirm]),
    );
    let harness = common::harness(
        common::test_config(),
        common::unused_extractor(),
        common::unused_analyzer(),
        Some(Arc::clone(&ledger) as Arc<dyn Ledger>),
    )
    .await;

    let first = common::seed_analysis(&harness.analyses, Severity::High).await;
    let second = common::seed_analysis(&harness.analyses, Severity::Critical).await;
    let failing_signal = harness.gate.maybe_signal(&first).await.unwrap().unwrap();
    let healthy_signal = harness.gate.maybe_signal(&second).await.unwrap().unwrap();

    monitor_for(&harness).sweep().await.unwrap();

    let failing_after = harness.signals.get(failing_signal.id).await.unwrap();
    assert_eq!(failing_after.status, SignalStatus::Failed.as_str());
    assert!(failing_after.tx_hash.is_none());

    let healthy_after = harness.signals.get(healthy_signal.id).await.unwrap();
    assert_eq!(healthy_after.status, SignalStatus::Sent.as_str());
    assert_eq!(ledger.submission_count(), 1);
}

#[tokio::test]
async fn sweep_survives_a_signal_with_a_missing_analysis() {
    let ledger = Arc::new(FakeLedger::new(LedgerScript::Confirm));
    let harness = common::harness(
        common::test_config(),
        common::unused_extractor(),
        common::unused_analyzer(),
        Some(Arc::clone(&ledger) as Arc<dyn Ledger>),
    )
    .await;

    let broken = common::seed_analysis(&harness.analyses, Severity::High).await;
    let healthy = common::seed_analysis(&harness.analyses, Severity::Critical).await;
    harness.gate.maybe_signal(&broken).await.unwrap().unwrap();
    let healthy_signal = harness.gate.maybe_signal(&healthy).await.unwrap().unwrap();

    // Deleting the analysis cascades away its signal; the sweep must cope
    // with rows vanishing underneath it and still process the rest.
    analysis_result::Entity::delete_by_id(broken.id)
        .exec(&harness.db)
        .await
        .unwrap();

    monitor_for(&harness).sweep().await.unwrap();

    let healthy_after = harness.signals.get(healthy_signal.id).await.unwrap();
    assert_eq!(healthy_after.status, SignalStatus::Sent.as_str());
    assert_eq!(ledger.submission_count(), 1);
}

#[tokio::test]
async fn sweep_is_a_noop_when_relay_is_disabled() {
    let ledger = Arc::new(FakeLedger::new(LedgerScript::Confirm));
    let mut config = common::test_config();
    config.oracle.enabled = false;
    config.oracle.endpoint = None;
    config.oracle.credential = None;

    let harness = common::harness(
        config,
        common::unused_extractor(),
        common::unused_analyzer(),
        Some(Arc::clone(&ledger) as Arc<dyn Ledger>),
    )
    .await;

    let analysis = common::seed_analysis(&harness.analyses, Severity::Critical).await;
    let signal = harness.gate.maybe_signal(&analysis).await.unwrap().unwrap();

    monitor_for(&harness).sweep().await.unwrap();

    let after = harness.signals.get(signal.id).await.unwrap();
    assert_eq!(after.status, SignalStatus::Pending.as_str());
    assert_eq!(ledger.submission_count(), 0);
}
