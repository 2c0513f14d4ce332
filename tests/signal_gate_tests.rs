//! Signal gate tests: the severity threshold, idempotent creation, and the
//! relay job enqueued alongside each new signal.

mod common;

use watchtower::domain::{JobKind, JobStatus, Severity, SignalStatus};
use watchtower::repositories::job::JobFilter;

#[tokio::test]
async fn low_and_medium_severity_never_create_signals() {
    let harness = common::harness(
        common::test_config(),
        common::unused_extractor(),
        common::unused_analyzer(),
        None,
    )
    .await;

    for severity in [Severity::Low, Severity::Medium] {
        let analysis = common::seed_analysis(&harness.analyses, severity).await;
        let outcome = harness.gate.maybe_signal(&analysis).await.unwrap();
        assert!(outcome.is_none(), "{severity} must not pass the gate");
    }

    let signals = harness
        .signals
        .list(&Default::default(), 50, None)
        .await
        .unwrap();
    assert!(signals.is_empty(), "no signal rows may exist");

    let relay_jobs = harness
        .jobs
        .list(
            &JobFilter {
                kind: Some(JobKind::RelaySignal),
                ..Default::default()
            },
            50,
            None,
        )
        .await
        .unwrap();
    assert!(relay_jobs.is_empty(), "no relay jobs may be enqueued");
}

#[tokio::test]
async fn high_and_critical_severity_create_pending_signals_with_relay_jobs() {
    let harness = common::harness(
        common::test_config(),
        common::unused_extractor(),
        common::unused_analyzer(),
        None,
    )
    .await;

    for severity in [Severity::High, Severity::Critical] {
        let analysis = common::seed_analysis(&harness.analyses, severity).await;
        let signal = harness
            .gate
            .maybe_signal(&analysis)
            .await
            .unwrap()
            .expect("severity passes the gate");

        assert_eq!(signal.status, SignalStatus::Pending.as_str());
        assert_eq!(signal.severity, severity.as_str());
        assert_eq!(signal.analysis_result_id, analysis.id);
        assert!(signal.tx_hash.is_none());
        assert!(!signal.tx_confirmed);
        assert!(!signal.payload_digest.is_empty());
    }

    let relay_jobs = harness
        .jobs
        .list(
            &JobFilter {
                kind: Some(JobKind::RelaySignal),
                status: Some(JobStatus::Pending),
                ..Default::default()
            },
            50,
            None,
        )
        .await
        .unwrap();
    assert_eq!(relay_jobs.len(), 2, "one relay job per created signal");
}

#[tokio::test]
async fn gate_is_idempotent_per_analysis_result() {
    let harness = common::harness(
        common::test_config(),
        common::unused_extractor(),
        common::unused_analyzer(),
        None,
    )
    .await;

    let analysis = common::seed_analysis(&harness.analyses, Severity::Critical).await;

    let first = harness.gate.maybe_signal(&analysis).await.unwrap();
    let second = harness.gate.maybe_signal(&analysis).await.unwrap();

    assert!(first.is_some());
    assert!(second.is_none(), "second invocation is a no-op");

    let signals = harness
        .signals
        .list(&Default::default(), 50, None)
        .await
        .unwrap();
    assert_eq!(signals.len(), 1, "exactly one signal per analysis result");
}

#[tokio::test]
async fn signal_creation_happens_even_when_relay_is_disabled() {
    let mut config = common::test_config();
    config.oracle.enabled = false;
    config.oracle.endpoint = None;
    config.oracle.credential = None;

    let harness = common::harness(
        config,
        common::unused_extractor(),
        common::unused_analyzer(),
        None,
    )
    .await;

    let analysis = common::seed_analysis(&harness.analyses, Severity::High).await;
    let signal = harness
        .gate
        .maybe_signal(&analysis)
        .await
        .unwrap()
        .expect("audit trail still gets a signal");

    assert_eq!(signal.status, SignalStatus::Pending.as_str());
}
