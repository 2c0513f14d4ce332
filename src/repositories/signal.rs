//! # Signal Repository
//!
//! Persistence and the compare-and-swap transitions for ledger-transmission
//! intents. The queue-triggered relay worker and the monitor sweep may race
//! on the same pending signal; `begin_attempt` is the single arbiter, an
//! atomic conditional update that at most one of them wins. Terminal
//! transitions (`mark_sent`, `mark_failed`) also re-check `pending`, so a
//! signal is never mutated in place once sent.

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Severity, SignalStatus};
use crate::error::{StoreError, is_unique_violation};
use crate::models::signal::{ActiveModel, Column, Entity, Model};

/// Opaque pagination cursor for signal listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

/// Filters for listing signals on the operator surface.
#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub status: Option<SignalStatus>,
    pub severity: Option<Severity>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// Outcome of idempotent signal creation.
#[derive(Debug, Clone)]
pub enum CreateSignalOutcome {
    Created(Box<Model>),
    /// A signal already exists for this analysis result.
    AlreadyExists,
}

/// Aggregate signal counts for the oracle status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SignalStats {
    pub total: u64,
    pub pending: u64,
    pub sent: u64,
    pub failed: u64,
    pub confirmed: u64,
}

/// Repository for signal operations
#[derive(Clone)]
pub struct SignalRepository {
    db: DatabaseConnection,
}

impl SignalRepository {
    /// Create a new SignalRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a pending signal for an analysis result. The unique index on
    /// analysis_result_id makes this idempotent: a second call for the same
    /// result returns `AlreadyExists` without touching the first signal.
    pub async fn create_for_analysis(
        &self,
        analysis_result_id: Uuid,
        severity: Severity,
        payload_digest: &str,
    ) -> Result<CreateSignalOutcome, StoreError> {
        let signal = ActiveModel {
            id: Set(Uuid::new_v4()),
            analysis_result_id: Set(analysis_result_id),
            severity: Set(severity.as_str().to_string()),
            payload_digest: Set(payload_digest.to_string()),
            status: Set(SignalStatus::Pending.as_str().to_string()),
            tx_hash: Set(None),
            tx_confirmed: Set(false),
            attempt_started_at: Set(None),
            created_at: Set(Utc::now().fixed_offset()),
            sent_at: Set(None),
        };

        match signal.insert(&self.db).await {
            Ok(model) => {
                tracing::info!(
                    signal_id = %model.id,
                    analysis_result_id = %analysis_result_id,
                    severity = %severity,
                    "Signal created"
                );
                Ok(CreateSignalOutcome::Created(Box::new(model)))
            }
            Err(err) if is_unique_violation(&err) => {
                tracing::debug!(
                    analysis_result_id = %analysis_result_id,
                    "Signal already exists for analysis result"
                );
                Ok(CreateSignalOutcome::AlreadyExists)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Claim the current submission attempt for a pending signal.
    ///
    /// Returns true when this caller won the attempt. A signal already
    /// carrying a fresh attempt marker (another worker is mid-submission)
    /// or no longer pending loses the CAS and returns false. Markers older
    /// than `attempt_ttl_seconds` are treated as abandoned and reclaimable.
    pub async fn begin_attempt(
        &self,
        signal_id: Uuid,
        attempt_ttl_seconds: u64,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let stale_cutoff = (now - Duration::seconds(attempt_ttl_seconds as i64)).fixed_offset();

        let result = Entity::update_many()
            .col_expr(Column::AttemptStartedAt, Expr::value(now.fixed_offset()))
            .filter(Column::Id.eq(signal_id))
            .filter(Column::Status.eq(SignalStatus::Pending.as_str()))
            .filter(
                Condition::any()
                    .add(Column::AttemptStartedAt.is_null())
                    .add(Column::AttemptStartedAt.lt(stale_cutoff)),
            )
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Transition a pending signal to `sent` with its confirmed transaction
    /// hash. Only fires while the signal is still pending.
    pub async fn mark_sent(&self, signal_id: Uuid, tx_hash: &str) -> Result<bool, StoreError> {
        let now = Utc::now().fixed_offset();
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(SignalStatus::Sent.as_str()))
            .col_expr(Column::TxHash, Expr::value(tx_hash))
            .col_expr(Column::TxConfirmed, Expr::value(true))
            .col_expr(Column::SentAt, Expr::value(now))
            .col_expr(
                Column::AttemptStartedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(Column::Id.eq(signal_id))
            .filter(Column::Status.eq(SignalStatus::Pending.as_str()))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Transition a pending signal to `failed`. `tx_hash` is recorded when
    /// the submission reached the network before failing (a failed or
    /// timed-out receipt), and stays empty otherwise.
    pub async fn mark_failed(
        &self,
        signal_id: Uuid,
        tx_hash: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(SignalStatus::Failed.as_str()))
            .col_expr(Column::TxHash, Expr::value(tx_hash))
            .col_expr(
                Column::AttemptStartedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(Column::Id.eq(signal_id))
            .filter(Column::Status.eq(SignalStatus::Pending.as_str()))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Reset a failed (or still-pending) signal for a fresh transmission
    /// attempt: back to `pending` with the transaction fields cleared before
    /// any new submission is recorded. A `sent` signal is never touched.
    pub async fn reset_for_retry(&self, signal_id: Uuid) -> Result<bool, StoreError> {
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(SignalStatus::Pending.as_str()))
            .col_expr(Column::TxHash, Expr::value(Option::<String>::None))
            .col_expr(Column::TxConfirmed, Expr::value(false))
            .col_expr(Column::SentAt, Expr::value(Option::<DateTime<Utc>>::None))
            .col_expr(
                Column::AttemptStartedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(Column::Id.eq(signal_id))
            .filter(Column::Status.is_in([
                SignalStatus::Failed.as_str(),
                SignalStatus::Pending.as_str(),
            ]))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Find a signal by ID.
    pub async fn find_by_id(&self, signal_id: Uuid) -> Result<Option<Model>, StoreError> {
        Ok(Entity::find_by_id(signal_id).one(&self.db).await?)
    }

    /// Find a signal by ID, erroring when absent.
    pub async fn get(&self, signal_id: Uuid) -> Result<Model, StoreError> {
        self.find_by_id(signal_id)
            .await?
            .ok_or(StoreError::SignalNotFound { signal_id })
    }

    /// Pending signals at or above the given severity, oldest first. This is
    /// the monitor's sweep query.
    pub async fn list_pending(
        &self,
        min_severity: Severity,
        limit: u64,
    ) -> Result<Vec<Model>, StoreError> {
        let severities: Vec<&str> = [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ]
        .into_iter()
        .filter(|s| *s >= min_severity)
        .map(Severity::as_str)
        .collect();

        Ok(Entity::find()
            .filter(Column::Status.eq(SignalStatus::Pending.as_str()))
            .filter(Column::Severity.is_in(severities))
            .order_by_asc(Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    /// List signals matching the filter, newest first, with cursor pagination.
    pub async fn list(
        &self,
        filter: &SignalFilter,
        limit: u64,
        cursor: Option<SignalCursor>,
    ) -> Result<Vec<Model>, StoreError> {
        let mut query = Entity::find()
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .limit(limit);

        if let Some(status) = filter.status {
            query = query.filter(Column::Status.eq(status.as_str()));
        }
        if let Some(severity) = filter.severity {
            query = query.filter(Column::Severity.eq(severity.as_str()));
        }
        if let Some(after) = filter.created_after {
            query = query.filter(Column::CreatedAt.gte(after.fixed_offset()));
        }
        if let Some(before) = filter.created_before {
            query = query.filter(Column::CreatedAt.lte(before.fixed_offset()));
        }
        if let Some(cursor) = cursor {
            let at = cursor.created_at.fixed_offset();
            query = query.filter(
                Condition::any()
                    .add(Column::CreatedAt.lt(at))
                    .add(
                        Condition::all()
                            .add(Column::CreatedAt.eq(at))
                            .add(Column::Id.lt(cursor.id)),
                    ),
            );
        }

        Ok(query.all(&self.db).await?)
    }

    /// Aggregate counts for the oracle status endpoint.
    pub async fn stats(&self) -> Result<SignalStats, StoreError> {
        let total = Entity::find().count(&self.db).await?;
        let pending = Entity::find()
            .filter(Column::Status.eq(SignalStatus::Pending.as_str()))
            .count(&self.db)
            .await?;
        let sent = Entity::find()
            .filter(Column::Status.eq(SignalStatus::Sent.as_str()))
            .count(&self.db)
            .await?;
        let failed = Entity::find()
            .filter(Column::Status.eq(SignalStatus::Failed.as_str()))
            .count(&self.db)
            .await?;
        let confirmed = Entity::find()
            .filter(Column::TxConfirmed.eq(true))
            .count(&self.db)
            .await?;

        Ok(SignalStats {
            total,
            pending,
            sent,
            failed,
            confirmed,
        })
    }
}
