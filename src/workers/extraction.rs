//! Extraction job body.
//!
//! Calls the extraction collaborator (retrying transient failures with
//! capped exponential backoff inside this single execution), then writes
//! every payload through the dedup gate and summarizes the counts in the
//! job output. Duplicates are counted, never errors.

use rand::{Rng, thread_rng};
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::collaborators::ExtractError;
use crate::config::ExtractRetryConfig;
use crate::domain::{JobOutput, SourceConfig};
use crate::models::job::Model as Job;

use super::WorkerContext;

/// Execute one extraction job. Returns the typed output on success or the
/// error text destined for the job's `error` field.
pub async fn run(
    ctx: &WorkerContext,
    job: &Job,
    worker_id: &str,
    source_ref: &str,
    source: &SourceConfig,
) -> Result<JobOutput, String> {
    info!(source_ref, urls = source.urls.len(), "Starting extraction");

    let payloads = extract_with_retry(ctx, source, &ctx.config.extract_retry)
        .await
        .map_err(|e| e.to_string())?;

    if let Err(err) = ctx.jobs.report_progress(job.id, worker_id, 0.5).await {
        // Progress is advisory; losing it must not fail a healthy extraction.
        warn!(error = ?err, "Could not report extraction progress");
    }

    let records_extracted = payloads.len();
    let mut records_new = 0usize;
    let mut records_duplicate = 0usize;

    for payload in payloads {
        let outcome = ctx
            .records
            .insert_if_new(source_ref, payload)
            .await
            .map_err(|e| format!("failed to store record: {e}"))?;

        if outcome.is_inserted() {
            records_new += 1;
        } else {
            records_duplicate += 1;
        }
    }

    info!(
        source_ref,
        records_extracted, records_new, records_duplicate, "Extraction finished"
    );

    Ok(JobOutput::Extract {
        records_extracted,
        records_new,
        records_duplicate,
    })
}

/// Call the extractor, retrying transient failures up to the configured
/// attempt cap. Fatal failures and cap exhaustion surface the last error.
async fn extract_with_retry(
    ctx: &WorkerContext,
    source: &SourceConfig,
    retry: &ExtractRetryConfig,
) -> Result<Vec<serde_json::Value>, ExtractError> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match ctx.extractor.extract(source).await {
            Ok(payloads) => return Ok(payloads),
            Err(err) if err.is_transient() && attempt < retry.max_attempts => {
                let backoff = backoff_duration(retry, attempt - 1);
                debug!(
                    attempt,
                    max_attempts = retry.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient extraction failure; backing off"
                );
                sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Capped exponential backoff with jitter: base * 2^failures, bounded by the
/// configured maximum.
fn backoff_duration(retry: &ExtractRetryConfig, prior_failures: u32) -> Duration {
    let exp = (retry.base_seconds as f64 * 2_f64.powi(prior_failures as i32))
        .min(retry.max_seconds as f64);

    let jitter = if retry.jitter_factor > 0.0 && exp > 0.0 {
        thread_rng().gen_range(0.0..(retry.jitter_factor * exp))
    } else {
        0.0
    };

    Duration::from_secs_f64(exp + jitter)
}
