//! # Signals API Handlers
//!
//! Operator surface over the signal table: list and inspect signals, and
//! trigger an explicit retry of a failed (or stuck-pending) transmission.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::cursor::{decode_cursor, encode_cursor};
use crate::domain::{Severity, SignalStatus};
use crate::error::{ApiError, validation_error};
use crate::models::signal;
use crate::repositories::signal::{SignalCursor, SignalFilter};
use crate::server::AppState;

use super::jobs::{parse_optional, parse_optional_timestamp, parse_uuid};

/// Query parameters for listing signals
#[derive(Debug, Deserialize)]
pub struct ListSignalsQuery {
    /// Filter by signal status (one of: pending, sent, failed)
    pub status: Option<String>,
    /// Filter by severity (one of: low, medium, high, critical)
    pub severity: Option<String>,
    /// Filter for signals created after this timestamp (RFC3339)
    pub created_after: Option<String>,
    /// Filter for signals created before this timestamp (RFC3339)
    pub created_before: Option<String>,
    /// Maximum number of signals to return (default: 50, max: 100)
    pub limit: Option<u32>,
    /// Opaque cursor for pagination
    pub cursor: Option<String>,
}

/// Signal information response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignalInfo {
    /// Unique identifier for the signal
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: String,
    /// Analysis result this signal was derived from
    pub analysis_result_id: String,
    /// Severity inherited from the analysis result
    #[schema(example = "critical")]
    pub severity: String,
    /// Digest of the canonical transaction payload
    pub payload_digest: String,
    /// Current transmission status
    #[schema(example = "pending")]
    pub status: String,
    /// Ledger transaction hash, set once a submission reached the network
    pub tx_hash: Option<String>,
    /// Whether the transaction was confirmed
    pub tx_confirmed: bool,
    /// Timestamp when the signal was created
    pub created_at: String,
    /// Timestamp when the signal was successfully sent
    pub sent_at: Option<String>,
}

/// Response payload for the signals listing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignalsResponse {
    /// List of signals matching the query
    pub signals: Vec<SignalInfo>,
    /// Opaque cursor for fetching the next page (null if no more pages)
    pub next_cursor: Option<String>,
}

/// Response for a signal retry
#[derive(Debug, Serialize, ToSchema)]
pub struct RetrySignalResponse {
    /// Identifier of the signal reset for retry
    pub signal_id: String,
    /// Identifier of the freshly enqueued relay job
    pub job_id: String,
    /// Signal status after the reset (always pending)
    pub status: String,
}

impl From<signal::Model> for SignalInfo {
    fn from(model: signal::Model) -> Self {
        Self {
            id: model.id.to_string(),
            analysis_result_id: model.analysis_result_id.to_string(),
            severity: model.severity,
            payload_digest: model.payload_digest,
            status: model.status,
            tx_hash: model.tx_hash,
            tx_confirmed: model.tx_confirmed,
            created_at: model.created_at.to_rfc3339(),
            sent_at: model.sent_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// List signals with optional filters
#[utoipa::path(
    get,
    path = "/signals",
    security(("bearer_auth" = [])),
    params(
        ("status" = Option<String>, Query, description = "Filter by signal status"),
        ("severity" = Option<String>, Query, description = "Filter by severity"),
        ("created_after" = Option<String>, Query, description = "Filter signals created after this RFC3339 timestamp"),
        ("created_before" = Option<String>, Query, description = "Filter signals created before this RFC3339 timestamp"),
        ("limit" = Option<u32>, Query, description = "Maximum number of signals to return (default 50, max 100)"),
        ("cursor" = Option<String>, Query, description = "Opaque pagination cursor")
    ),
    responses(
        (status = 200, description = "List of signals", body = SignalsResponse),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Authentication required")
    ),
    tag = "signals"
)]
pub async fn list_signals(
    State(state): State<AppState>,
    Query(query): Query<ListSignalsQuery>,
) -> Result<Json<SignalsResponse>, ApiError> {
    let filter = SignalFilter {
        status: parse_optional::<SignalStatus>(query.status.as_deref(), "status")?,
        severity: parse_optional::<Severity>(query.severity.as_deref(), "severity")?,
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
        .map(decode_cursor::<SignalCursor>)
        .transpose()?;

    let signals = state
        .signal_repository()
        .list(&filter, limit, cursor)
        .await?;

    let next_cursor = if signals.len() as u64 == limit {
        signals.last().map(|last| {
            encode_cursor(&SignalCursor {
                created_at: last.created_at.with_timezone(&Utc),
                id: last.id,
            })
        })
    } else {
        None
    };

    Ok(Json(SignalsResponse {
        signals: signals.into_iter().map(SignalInfo::from).collect(),
        next_cursor,
    }))
}

/// Get a signal by ID
#[utoipa::path(
    get,
    path = "/signals/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Signal ID (UUID)")),
    responses(
        (status = 200, description = "Signal details", body = SignalInfo),
        (status = 404, description = "Signal not found"),
        (status = 401, description = "Authentication required")
    ),
    tag = "signals"
)]
pub async fn get_signal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SignalInfo>, ApiError> {
    let signal_id = parse_uuid(&id, "id")?;
    let signal = state
        .signal_repository()
        .find_by_id(signal_id)
        .await?
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Signal {} not found", signal_id),
            )
        })?;

    Ok(Json(signal.into()))
}

/// Retry a failed or stuck-pending signal
///
/// Resets the signal to pending, clears its transaction fields, and enqueues
/// a fresh relay job. A sent signal is never retried.
#[utoipa::path(
    post,
    path = "/signals/{id}/retry",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Signal ID (UUID)")),
    responses(
        (status = 200, description = "Signal reset and relay job enqueued", body = RetrySignalResponse),
        (status = 400, description = "Signal is not retryable"),
        (status = 404, description = "Signal not found"),
        (status = 401, description = "Authentication required")
    ),
    tag = "signals"
)]
pub async fn retry_signal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RetrySignalResponse>, ApiError> {
    let signal_id = parse_uuid(&id, "id")?;
    let signals = state.signal_repository();

    // Reset first: tx_hash and tx_confirmed are cleared before any new
    // submission attempt can be recorded.
    if !signals.reset_for_retry(signal_id).await? {
        let signal = signals.find_by_id(signal_id).await?.ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Signal {} not found", signal_id),
            )
        })?;

        return Err(validation_error(
            &format!("Cannot retry signal with status '{}'", signal.status),
            serde_json::json!({"status": signal.status}),
        ));
    }

    let job = state
        .job_repository()
        .create(&crate::domain::JobInput::RelaySignal { signal_id })
        .await?;

    tracing::info!(signal_id = %signal_id, job_id = %job.id, "Signal retry enqueued");

    Ok(Json(RetrySignalResponse {
        signal_id: signal_id.to_string(),
        job_id: job.id.to_string(),
        status: SignalStatus::Pending.as_str().to_string(),
    }))
}
