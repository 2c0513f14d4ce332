//! # Job Executor
//!
//! Tick-driven worker pool for one dispatch queue. Each tick claims up to a
//! batch of eligible jobs through the atomic claim in the job repository and
//! runs them under a bounded semaphore. A job body's error fails that job;
//! it never takes the executor loop down with it.

use std::sync::Arc;

use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{JobInput, JobKind, JobOutput};
use crate::error::StoreError;
use crate::models::job::Model as Job;
use crate::repositories::JobRepository;

use super::WorkerContext;
use super::{analysis, extraction, relay};

/// Executor serving a single dispatch queue.
pub struct JobExecutor {
    kind: JobKind,
    worker_id: String,
    ctx: Arc<WorkerContext>,
}

impl JobExecutor {
    /// Create an executor for the given queue.
    pub fn new(kind: JobKind, ctx: Arc<WorkerContext>) -> Self {
        let worker_id = format!("{}-{}", kind, &Uuid::new_v4().to_string()[..8]);
        Self {
            kind,
            worker_id,
            ctx,
        }
    }

    /// Run the executor loop until the provided shutdown token fires.
    #[instrument(skip_all, fields(queue = %self.kind, worker_id = %self.worker_id))]
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting job executor");
        let tick = Duration::from_millis(self.ctx.config.executor.tick_ms);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Job executor shutdown requested");
                    break;
                }
                _ = async {
                    let start = std::time::Instant::now();

                    match self.tick().await {
                        Ok(count) if count > 0 => {
                            debug!(count, "Executed jobs this tick");
                        }
                        Ok(_) => {}
                        Err(err) => {
                            error!(error = ?err, "Executor tick failed");
                        }
                    }

                    // Sleep out the remaining tick time; a busy tick rolls
                    // straight into the next claim.
                    let elapsed = start.elapsed();
                    if elapsed < tick {
                        sleep(tick - elapsed).await;
                    }
                } => {}
            }
        }

        info!("Job executor stopped");
    }

    /// Claim up to a batch of jobs and run them to completion or failure.
    pub async fn tick(&self) -> Result<usize, StoreError> {
        let mut claimed = Vec::new();
        for _ in 0..self.ctx.config.executor.claim_batch {
            match self.ctx.jobs.claim(self.kind, &self.worker_id).await? {
                Some(job) => claimed.push(job),
                None => break,
            }
        }

        if claimed.is_empty() {
            return Ok(0);
        }

        let count = claimed.len();
        debug!(count, "Claimed jobs for execution");

        let semaphore = Arc::new(Semaphore::new(self.ctx.config.executor.concurrency));
        let mut handles = Vec::with_capacity(count);

        for job in claimed {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore never closed");
            let ctx = Arc::clone(&self.ctx);
            let worker_id = self.worker_id.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                run_single_job(&ctx, &worker_id, job).await;
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        Ok(count)
    }
}

/// Run one claimed job to a terminal state.
///
/// The job body runs under the configured execution timeout. Whatever
/// happens (success, collaborator failure, timeout) ends in exactly one
/// `complete` or `fail` transition on the ledger; failures to record that
/// transition are logged, never propagated into the loop.
#[instrument(skip_all, fields(job_id = %job.id, kind = %job.kind))]
pub async fn run_single_job(ctx: &WorkerContext, worker_id: &str, job: Job) {
    let started = std::time::Instant::now();
    let max_run = Duration::from_secs(ctx.config.executor.max_run_seconds);

    let result = match JobRepository::decode_input(&job) {
        Ok(input) => {
            match tokio::time::timeout(max_run, execute(ctx, worker_id, &job, input)).await {
                Ok(result) => result,
                Err(_) => Err(format!(
                    "job execution timed out after {}s",
                    ctx.config.executor.max_run_seconds
                )),
            }
        }
        Err(err) => Err(err.to_string()),
    };

    let elapsed = started.elapsed();
    histogram!("job_duration_ms", "kind" => job.kind.clone())
        .record(elapsed.as_secs_f64() * 1_000.0);

    match result {
        Ok(output) => {
            counter!("jobs_completed_total", "kind" => job.kind.clone()).increment(1);
            if let Err(err) = ctx.jobs.complete(job.id, worker_id, &output).await {
                // Usually means the lease expired and another worker took
                // over; the store stays authoritative either way.
                warn!(error = ?err, "Could not record job completion");
            }
        }
        Err(message) => {
            counter!("jobs_failed_total", "kind" => job.kind.clone()).increment(1);
            if let Err(err) = ctx.jobs.fail(job.id, worker_id, &message).await {
                warn!(error = ?err, "Could not record job failure");
            }
        }
    }
}

async fn execute(
    ctx: &WorkerContext,
    worker_id: &str,
    job: &Job,
    input: JobInput,
) -> Result<JobOutput, String> {
    match input {
        JobInput::Extract { source_ref, source } => {
            extraction::run(ctx, job, worker_id, &source_ref, &source).await
        }
        JobInput::Analyze {
            dataset_ref,
            source_refs,
            categories,
        } => analysis::run(ctx, job, worker_id, dataset_ref, &source_refs, &categories).await,
        JobInput::RelaySignal { signal_id } => relay::run(ctx, signal_id).await,
    }
}
