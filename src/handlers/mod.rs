//! HTTP handlers for the operator surface.

pub mod jobs;
pub mod oracle;
pub mod signals;

use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::server::AppState;

/// Service identification payload
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceInfo {
    /// Service name
    pub name: &'static str,
    /// Service version
    pub version: &'static str,
}

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall status (always "ok" when this response is returned)
    pub status: &'static str,
}

/// Root endpoint returning service identification
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service information", body = ServiceInfo))
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "watchtower",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness/readiness probe backed by a database round trip
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Database unavailable")
    )
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    crate::db::health_check(&state.db).await.map_err(|e| {
        tracing::error!(error = ?e, "Health check failed");
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "Database unavailable",
        )
    })?;

    Ok(Json(HealthResponse { status: "ok" }))
}
