//! Job ledger state machine tests: creation, atomic claiming, progress
//! monotonicity, terminal transitions, lease reclaim, and cleanup.

mod common;

use std::collections::HashSet;

use uuid::Uuid;
use watchtower::domain::{JobInput, JobKind, JobOutput, JobStatus, SourceConfig};
use watchtower::error::StoreError;
use watchtower::repositories::JobRepository;
use watchtower::repositories::job::JobFilter;

fn extract_input(source_ref: &str) -> JobInput {
    JobInput::Extract {
        source_ref: source_ref.to_string(),
        source: SourceConfig {
            urls: vec!["https://example.com/feed.json".to_string()],
            items_pointer: None,
            max_items: None,
        },
    }
}

fn relay_input() -> JobInput {
    JobInput::RelaySignal {
        signal_id: Uuid::new_v4(),
    }
}

fn sample_output() -> JobOutput {
    JobOutput::Extract {
        records_extracted: 1,
        records_new: 1,
        records_duplicate: 0,
    }
}

#[tokio::test]
async fn job_walks_pending_running_completed() {
    let db = common::setup_db().await;
    let repo = JobRepository::new(db, 300);

    let job = repo.create(&extract_input("src-1")).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending.as_str());
    assert_eq!(job.progress, 0.0);
    assert!(job.started_at.is_none());
    assert!(job.completed_at.is_none());

    let claimed = repo.claim(JobKind::Extract, "w1").await.unwrap().unwrap();
    assert_eq!(claimed.id, job.id);
    assert_eq!(claimed.status, JobStatus::Running.as_str());
    assert!(claimed.started_at.is_some());
    assert_eq!(claimed.worker_id.as_deref(), Some("w1"));

    repo.report_progress(job.id, "w1", 0.5).await.unwrap();
    repo.complete(job.id, "w1", &sample_output()).await.unwrap();

    let done = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed.as_str());
    assert_eq!(done.progress, 1.0);
    assert!(done.completed_at.is_some());
    assert!(done.output.is_some());
    assert!(done.error.is_none());
}

#[tokio::test]
async fn claim_is_fifo_per_queue() {
    let db = common::setup_db().await;
    let repo = JobRepository::new(db, 300);

    let first = repo.create(&extract_input("src-a")).await.unwrap();
    let second = repo.create(&extract_input("src-b")).await.unwrap();
    // A job on another queue must never be claimed by this one.
    repo.create(&relay_input()).await.unwrap();

    let claimed_first = repo.claim(JobKind::Extract, "w1").await.unwrap().unwrap();
    let claimed_second = repo.claim(JobKind::Extract, "w1").await.unwrap().unwrap();

    assert_eq!(claimed_first.id, first.id);
    assert_eq!(claimed_second.id, second.id);
    assert!(repo.claim(JobKind::Extract, "w1").await.unwrap().is_none());
    assert!(repo.claim(JobKind::Analyze, "w1").await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_claimers_never_share_a_job() {
    let db = common::setup_db().await;
    let repo = JobRepository::new(db, 300);

    const JOBS: usize = 24;
    for i in 0..JOBS {
        repo.create(&extract_input(&format!("src-{i}"))).await.unwrap();
    }

    let mut handles = Vec::new();
    for worker in 0..4 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            let worker_id = format!("w{worker}");
            let mut claimed = Vec::new();
            while let Some(job) = repo.claim(JobKind::Extract, &worker_id).await.unwrap() {
                claimed.push(job.id);
                tokio::task::yield_now().await;
            }
            claimed
        }));
    }

    let mut all: Vec<Uuid> = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }

    let unique: HashSet<_> = all.iter().copied().collect();
    assert_eq!(all.len(), JOBS, "every job claimed exactly once");
    assert_eq!(unique.len(), JOBS, "no job claimed twice");
}

#[tokio::test]
async fn mutations_require_running_state_and_ownership() {
    let db = common::setup_db().await;
    let repo = JobRepository::new(db, 300);

    let job = repo.create(&extract_input("src-1")).await.unwrap();

    // Pending: no completion, no progress.
    assert!(matches!(
        repo.complete(job.id, "w1", &sample_output()).await,
        Err(StoreError::JobStateViolation { .. })
    ));
    assert!(matches!(
        repo.report_progress(job.id, "w1", 0.1).await,
        Err(StoreError::JobStateViolation { .. })
    ));

    repo.claim(JobKind::Extract, "w1").await.unwrap().unwrap();

    // Wrong owner.
    assert!(matches!(
        repo.complete(job.id, "w2", &sample_output()).await,
        Err(StoreError::JobStateViolation { .. })
    ));
    assert!(matches!(
        repo.fail(job.id, "w2", "boom").await,
        Err(StoreError::JobStateViolation { .. })
    ));

    repo.fail(job.id, "w1", "collaborator exploded").await.unwrap();
    let failed = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed.as_str());
    assert_eq!(failed.error.as_deref(), Some("collaborator exploded"));

    // Terminal: no transition out.
    assert!(matches!(
        repo.complete(job.id, "w1", &sample_output()).await,
        Err(StoreError::JobStateViolation { .. })
    ));

    // Unknown job surfaces as not-found, not a silent no-op.
    assert!(matches!(
        repo.fail(Uuid::new_v4(), "w1", "x").await,
        Err(StoreError::JobNotFound { .. })
    ));
}

#[tokio::test]
async fn progress_is_monotonic_and_bounded() {
    let db = common::setup_db().await;
    let repo = JobRepository::new(db, 300);

    let job = repo.create(&extract_input("src-1")).await.unwrap();
    repo.claim(JobKind::Extract, "w1").await.unwrap().unwrap();

    repo.report_progress(job.id, "w1", 0.6).await.unwrap();

    // Out-of-range fractions are rejected before touching the store; 1.0 is
    // reserved for completion.
    assert!(matches!(
        repo.report_progress(job.id, "w1", -0.1).await,
        Err(StoreError::InvalidProgress { .. })
    ));
    assert!(matches!(
        repo.report_progress(job.id, "w1", 1.0).await,
        Err(StoreError::InvalidProgress { .. })
    ));

    // Regression is refused.
    assert!(matches!(
        repo.report_progress(job.id, "w1", 0.3).await,
        Err(StoreError::JobStateViolation { .. })
    ));

    let current = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(current.progress, 0.6);
}

#[tokio::test]
async fn expired_lease_makes_running_job_reclaimable() {
    let db = common::setup_db().await;
    // Zero-length lease: a claim expires immediately.
    let repo = JobRepository::new(db, 0);

    let job = repo.create(&extract_input("src-1")).await.unwrap();
    let first = repo.claim(JobKind::Extract, "w1").await.unwrap().unwrap();
    assert_eq!(first.id, job.id);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // The dead worker's job is handed to a new claimer; started_at is not
    // reset by the reclaim.
    let second = repo.claim(JobKind::Extract, "w2").await.unwrap().unwrap();
    assert_eq!(second.id, job.id);
    assert_eq!(second.status, JobStatus::Running.as_str());
    assert_eq!(second.worker_id.as_deref(), Some("w2"));
    assert_eq!(second.started_at, first.started_at);

    // The original worker's late completion is a state violation, not an
    // overwrite of the new owner's run.
    assert!(matches!(
        repo.complete(job.id, "w1", &sample_output()).await,
        Err(StoreError::JobStateViolation { .. })
    ));
}

#[tokio::test]
async fn cleanup_removes_only_old_terminal_jobs() {
    let db = common::setup_db().await;
    let repo = JobRepository::new(db, 300);

    let terminal = repo.create(&extract_input("src-1")).await.unwrap();
    repo.claim(JobKind::Extract, "w1").await.unwrap().unwrap();
    repo.complete(terminal.id, "w1", &sample_output()).await.unwrap();

    let pending = repo.create(&extract_input("src-2")).await.unwrap();

    // Everything here was created moments ago, so a 1-day threshold deletes
    // nothing.
    assert_eq!(repo.cleanup_terminal(1).await.unwrap(), 0);
    assert!(repo.find_by_id(terminal.id).await.unwrap().is_some());
    assert!(repo.find_by_id(pending.id).await.unwrap().is_some());
}

#[tokio::test]
async fn list_filters_by_status_and_kind() {
    let db = common::setup_db().await;
    let repo = JobRepository::new(db, 300);

    let extract = repo.create(&extract_input("src-1")).await.unwrap();
    let relay = repo.create(&relay_input()).await.unwrap();
    repo.claim(JobKind::Extract, "w1").await.unwrap().unwrap();
    repo.complete(extract.id, "w1", &sample_output()).await.unwrap();

    let completed = repo
        .list(
            &JobFilter {
                status: Some(JobStatus::Completed),
                ..Default::default()
            },
            50,
            None,
        )
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, extract.id);

    let relays = repo
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
    assert_eq!(relays.len(), 1);
    assert_eq!(relays[0].id, relay.id);

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.success_rate, 100.0);
    assert_eq!(stats.by_kind["extract"], 1);
    assert_eq!(stats.by_kind["relay_signal"], 1);
}
