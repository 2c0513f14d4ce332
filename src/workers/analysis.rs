//! Analysis job body.
//!
//! Loads the dataset's records, calls the analysis collaborator exactly once
//! (a partial statistical computation is not safe to resume blindly, so
//! there is no retry), persists the outcomes, and runs each through the
//! signal gate.

use tracing::{info, warn};
use uuid::Uuid;

use crate::collaborators::DatasetRecord;
use crate::domain::JobOutput;
use crate::models::job::Model as Job;
use crate::repositories::analysis::NewAnalysisResult;

use super::WorkerContext;

/// Execute one analysis job. Returns the typed output on success or the
/// error text destined for the job's `error` field.
pub async fn run(
    ctx: &WorkerContext,
    job: &Job,
    worker_id: &str,
    dataset_ref: Uuid,
    source_refs: &[String],
    categories: &[String],
) -> Result<JobOutput, String> {
    info!(dataset_ref = %dataset_ref, sources = source_refs.len(), "Starting analysis");

    let records = ctx
        .records
        .list_by_sources(source_refs)
        .await
        .map_err(|e| format!("failed to load dataset records: {e}"))?;

    if records.is_empty() {
        return Err(format!("no records found for dataset {dataset_ref}"));
    }

    if let Err(err) = ctx.jobs.report_progress(job.id, worker_id, 0.2).await {
        warn!(error = ?err, "Could not report analysis progress");
    }

    let dataset: Vec<DatasetRecord> = records
        .into_iter()
        .map(|record| DatasetRecord {
            source_ref: record.source_ref,
            payload: record.payload,
        })
        .collect();

    let outcomes = ctx
        .analyzer
        .analyze(dataset_ref, &dataset, categories)
        .await
        .map_err(|e| e.to_string())?;

    if let Err(err) = ctx.jobs.report_progress(job.id, worker_id, 0.8).await {
        warn!(error = ?err, "Could not report analysis progress");
    }

    let mut created_categories = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let category = outcome.category.clone();
        let persisted = ctx
            .analyses
            .insert(NewAnalysisResult {
                dataset_ref,
                category: outcome.category,
                metrics: outcome.metrics,
                quality_score: outcome.quality_score,
                severity: outcome.severity,
            })
            .await
            .map_err(|e| format!("failed to store analysis result: {e}"))?;

        // Gate every persisted result; low severities and repeats fall out
        // here as non-events.
        if let Err(err) = ctx.gate.maybe_signal(&persisted).await {
            return Err(format!("signal gate failed for analysis {}: {err}", persisted.id));
        }

        created_categories.push(category);
    }

    info!(
        dataset_ref = %dataset_ref,
        analyses_created = created_categories.len(),
        "Analysis finished"
    );

    Ok(JobOutput::Analyze {
        analyses_created: created_categories.len(),
        categories: created_categories,
    })
}
