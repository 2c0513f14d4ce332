//! # Oracle API Handlers
//!
//! Operator visibility into the ledger relay: the capability flag, the
//! configured endpoint, a credential fingerprint, and signal counts.

use axum::{extract::State, response::Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::oracle::Credential;
use crate::repositories::signal::SignalStats;
use crate::server::AppState;

/// Oracle status response
#[derive(Debug, Serialize, ToSchema)]
pub struct OracleStatusResponse {
    /// Whether ledger relay is enabled
    pub enabled: bool,
    /// Configured gateway endpoint, if any
    pub endpoint: Option<String>,
    /// Short fingerprint of the signing credential, if configured
    pub credential_fingerprint: Option<String>,
    /// Chain identifier included in transaction payloads
    pub chain_id: u64,
    /// Minimum severity admitted by the signal gate
    pub min_severity: String,
    /// Aggregate signal counts
    #[schema(value_type = Object)]
    pub signals: SignalStats,
}

/// Oracle relay status
#[utoipa::path(
    get,
    path = "/oracle/status",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Oracle relay status", body = OracleStatusResponse),
        (status = 401, description = "Authentication required")
    ),
    tag = "oracle"
)]
pub async fn oracle_status(
    State(state): State<AppState>,
) -> Result<Json<OracleStatusResponse>, ApiError> {
    let oracle = &state.config.oracle;

    let credential_fingerprint = oracle
        .credential
        .as_deref()
        .and_then(|hex_str| Credential::from_hex(hex_str).ok())
        .map(|credential| credential.fingerprint());

    let signals = state.signal_repository().stats().await?;

    Ok(Json(OracleStatusResponse {
        enabled: oracle.enabled,
        endpoint: oracle.endpoint.clone(),
        credential_fingerprint,
        chain_id: oracle.chain_id,
        min_severity: oracle.min_severity.to_string(),
        signals,
    }))
}
