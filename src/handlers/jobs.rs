//! # Jobs API Handlers
//!
//! Operator surface over the job ledger: submit extraction/analysis jobs,
//! inspect status and progress, list with filters, aggregate stats, and
//! clean up old terminal jobs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cursor::{decode_cursor, encode_cursor};
use crate::domain::{JobInput, JobKind, JobStatus};
use crate::error::{ApiError, validation_error};
use crate::models::job;
use crate::repositories::job::{JobCursor, JobFilter, JobStats};
use crate::server::AppState;

/// Request body for submitting a job. The input is the tagged payload shape
/// for the job's queue.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitJobRequest {
    /// Typed job input, tagged by `kind` (extract or analyze)
    pub input: JsonValue,
}

/// Response for a submitted job
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitJobResponse {
    /// Identifier of the created job
    pub job_id: String,
    /// Initial status (always pending)
    pub status: String,
}

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    /// Filter by job status (one of: pending, running, completed, failed)
    pub status: Option<String>,
    /// Filter by job kind (one of: extract, analyze, relay_signal)
    pub kind: Option<String>,
    /// Filter for jobs created after this timestamp (RFC3339)
    pub created_after: Option<String>,
    /// Filter for jobs created before this timestamp (RFC3339)
    pub created_before: Option<String>,
    /// Maximum number of jobs to return (default: 50, max: 100)
    pub limit: Option<u32>,
    /// Opaque cursor for pagination
    pub cursor: Option<String>,
}

/// Query parameters for terminal-job cleanup
#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    /// Delete terminal jobs older than this many days (default: 7, max: 90)
    pub days_old: Option<u32>,
}

/// Response payload for the cleanup endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupResponse {
    /// Number of jobs deleted
    pub deleted_count: u64,
}

/// Job information response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobInfo {
    /// Unique identifier for the job
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: String,
    /// Dispatch queue this job belongs to
    #[schema(example = "extract")]
    pub kind: String,
    /// Current lifecycle status
    #[schema(example = "pending")]
    pub status: String,
    /// Fraction of work done in [0.0, 1.0]
    #[schema(example = 0.5)]
    pub progress: f64,
    /// Typed input payload
    pub input: JsonValue,
    /// Typed output payload, present only when completed
    pub output: Option<JsonValue>,
    /// Error text, present only when failed
    pub error: Option<String>,
    /// Timestamp when the job was created
    #[schema(example = "2021-01-01T00:00:00Z")]
    pub created_at: String,
    /// Timestamp when the job was first claimed
    pub started_at: Option<String>,
    /// Timestamp when the job reached a terminal state
    pub completed_at: Option<String>,
}

/// Response payload for the jobs listing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobsResponse {
    /// List of jobs matching the query
    pub jobs: Vec<JobInfo>,
    /// Opaque cursor for fetching the next page (null if no more pages)
    pub next_cursor: Option<String>,
}

impl From<job::Model> for JobInfo {
    fn from(model: job::Model) -> Self {
        Self {
            id: model.id.to_string(),
            kind: model.kind,
            status: model.status,
            progress: model.progress,
            input: model.input,
            output: model.output,
            error: model.error,
            created_at: model.created_at.to_rfc3339(),
            started_at: model.started_at.map(|dt| dt.to_rfc3339()),
            completed_at: model.completed_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Submit a new extraction or analysis job
#[utoipa::path(
    post,
    path = "/jobs",
    security(("bearer_auth" = [])),
    request_body = SubmitJobRequest,
    responses(
        (status = 202, description = "Job accepted for asynchronous execution", body = SubmitJobResponse),
        (status = 400, description = "Invalid job input"),
        (status = 401, description = "Authentication required")
    ),
    tag = "jobs"
)]
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), ApiError> {
    let input: JobInput = serde_json::from_value(request.input).map_err(|e| {
        validation_error(
            "Invalid job input",
            serde_json::json!({"input": e.to_string()}),
        )
    })?;

    // Relay jobs reference a signal owned by the gate; only the gate and the
    // signal retry endpoint may enqueue them.
    if input.kind() == JobKind::RelaySignal {
        return Err(validation_error(
            "relay_signal jobs are enqueued by the signal gate, not submitted directly",
            serde_json::json!({"kind": "relay_signal"}),
        ));
    }

    let job = state.job_repository().create(&input).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id: job.id.to_string(),
            status: job.status,
        }),
    ))
}

/// Get a job by ID
#[utoipa::path(
    get,
    path = "/jobs/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Job ID (UUID)")),
    responses(
        (status = 200, description = "Job details", body = JobInfo),
        (status = 404, description = "Job not found"),
        (status = 401, description = "Authentication required")
    ),
    tag = "jobs"
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobInfo>, ApiError> {
    let job_id = parse_uuid(&id, "id")?;
    let job = state
        .job_repository()
        .find_by_id(job_id)
        .await?
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Job {} not found", job_id),
            )
        })?;

    Ok(Json(job.into()))
}

/// List jobs with optional filters
#[utoipa::path(
    get,
    path = "/jobs",
    security(("bearer_auth" = [])),
    params(
        ("status" = Option<String>, Query, description = "Filter by job status"),
        ("kind" = Option<String>, Query, description = "Filter by job kind"),
        ("created_after" = Option<String>, Query, description = "Filter jobs created after this RFC3339 timestamp"),
        ("created_before" = Option<String>, Query, description = "Filter jobs created before this RFC3339 timestamp"),
        ("limit" = Option<u32>, Query, description = "Maximum number of jobs to return (default 50, max 100)"),
        ("cursor" = Option<String>, Query, description = "Opaque pagination cursor")
    ),
    responses(
        (status = 200, description = "List of jobs", body = JobsResponse),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Authentication required")
    ),
    tag = "jobs"
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<JobsResponse>, ApiError> {
    let filter = JobFilter {
        status: parse_optional::<JobStatus>(query.status.as_deref(), "status")?,
        kind: parse_optional::<JobKind>(query.kind.as_deref(), "kind")?,
        created_after: parse_optional_timestamp(query.created_after.as_deref(), "created_after")?,
        created_before: parse_optional_timestamp(
            query.created_before.as_deref(),
            "created_before",
        )?,
    };

    let limit = query.limit.unwrap_or(50).min(100) as u64;
    let cursor = query
        .cursor
        .as_deref()
        .map(decode_cursor::<JobCursor>)
        .transpose()?;

    let jobs = state.job_repository().list(&filter, limit, cursor).await?;

    let next_cursor = if jobs.len() as u64 == limit {
        jobs.last().map(|last| {
            encode_cursor(&JobCursor {
                created_at: last.created_at.with_timezone(&Utc),
                id: last.id,
            })
        })
    } else {
        None
    };

    Ok(Json(JobsResponse {
        jobs: jobs.into_iter().map(JobInfo::from).collect(),
        next_cursor,
    }))
}

/// Aggregate job statistics
#[utoipa::path(
    get,
    path = "/jobs/stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Job statistics"),
        (status = 401, description = "Authentication required")
    ),
    tag = "jobs"
)]
pub async fn job_stats(State(state): State<AppState>) -> Result<Json<JobStats>, ApiError> {
    Ok(Json(state.job_repository().stats().await?))
}

/// Delete terminal jobs older than a number of days
#[utoipa::path(
    post,
    path = "/jobs/cleanup",
    security(("bearer_auth" = [])),
    params(("days_old" = Option<u32>, Query, description = "Age threshold in days (default 7, max 90)")),
    responses(
        (status = 200, description = "Cleanup result", body = CleanupResponse),
        (status = 400, description = "Invalid threshold"),
        (status = 401, description = "Authentication required")
    ),
    tag = "jobs"
)]
pub async fn cleanup_jobs(
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let days_old = query.days_old.unwrap_or(7);
    if days_old == 0 || days_old > 90 {
        return Err(validation_error(
            "days_old must be between 1 and 90",
            serde_json::json!({"days_old": days_old}),
        ));
    }

    let deleted_count = state.job_repository().cleanup_terminal(days_old).await?;

    Ok(Json(CleanupResponse { deleted_count }))
}

pub(super) fn parse_uuid(value: &str, field: &str) -> Result<Uuid, ApiError> {
    value.parse().map_err(|_| {
        validation_error(
            &format!("{field} must be a valid UUID"),
            serde_json::json!({field: value}),
        )
    })
}

pub(super) fn parse_optional<T: std::str::FromStr>(
    value: Option<&str>,
    field: &str,
) -> Result<Option<T>, ApiError> {
    value
        .map(|raw| {
            raw.parse::<T>().map_err(|_| {
                validation_error(
                    &format!("invalid {field} value"),
                    serde_json::json!({field: raw}),
                )
            })
        })
        .transpose()
}

pub(super) fn parse_optional_timestamp(
    value: Option<&str>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| {
                    validation_error(
                        &format!("{field} must be an RFC3339 timestamp"),
                        serde_json::json!({field: raw}),
                    )
                })
        })
        .transpose()
}
