//! # Job Repository
//!
//! The job ledger state machine. Every lifecycle transition is a single
//! conditional UPDATE filtered on the job's current status (and claim owner
//! where applicable), so concurrent workers coordinate entirely through the
//! store: at most one caller ever wins a claim, and a mutation attempted on
//! a job in the wrong state surfaces [`StoreError::JobStateViolation`]
//! instead of silently clobbering it.

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{JobInput, JobKind, JobOutput, JobStatus};
use crate::error::StoreError;
use crate::models::job::{ActiveModel, Column, Entity, Model};

/// Opaque pagination cursor for job listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

/// Filters for listing jobs on the operator surface.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub kind: Option<JobKind>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// Aggregate job counts for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    pub total: u64,
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub by_kind: std::collections::BTreeMap<String, u64>,
    pub recent_24h: u64,
    pub success_rate: f64,
}

/// Repository for job ledger operations
#[derive(Clone)]
pub struct JobRepository {
    db: DatabaseConnection,
    lease_seconds: i64,
}

impl JobRepository {
    /// Create a new JobRepository with the given database connection and
    /// claim lease length.
    pub fn new(db: DatabaseConnection, lease_seconds: u64) -> Self {
        Self {
            db,
            lease_seconds: lease_seconds as i64,
        }
    }

    /// Create a new job in `pending` on the queue matching its input.
    pub async fn create(&self, input: &JobInput) -> Result<Model, StoreError> {
        let now = Utc::now().fixed_offset();
        let input_json =
            serde_json::to_value(input).map_err(|e| StoreError::MalformedPayload {
                id: Uuid::nil(),
                details: e.to_string(),
            })?;

        let job = ActiveModel {
            id: Set(Uuid::new_v4()),
            kind: Set(input.kind().as_str().to_string()),
            status: Set(JobStatus::Pending.as_str().to_string()),
            progress: Set(0.0),
            input: Set(input_json),
            output: Set(None),
            error: Set(None),
            worker_id: Set(None),
            lease_expires_at: Set(None),
            created_at: Set(now),
            started_at: Set(None),
            completed_at: Set(None),
        };

        let job = job.insert(&self.db).await?;

        tracing::info!(
            job_id = %job.id,
            kind = %job.kind,
            "Job created"
        );

        Ok(job)
    }

    /// Atomically claim the oldest eligible job of the given kind.
    ///
    /// Eligible means `pending`, or `running` with an expired lease (the
    /// previous worker died; its later `complete`/`fail` will lose the owner
    /// check and surface a state violation rather than corrupting the row).
    /// The claim itself is a conditional UPDATE that re-checks eligibility,
    /// so two concurrent callers can never both win the same job; the loser
    /// moves on to the next candidate.
    pub async fn claim(&self, kind: JobKind, worker_id: &str) -> Result<Option<Model>, StoreError> {
        // A lost race retries against the next-oldest candidate; the loop
        // ends when the queue has no eligible jobs left.
        loop {
            let now = Utc::now();
            let eligible = Self::eligibility_condition(kind, now);

            let Some(candidate_id) = Entity::find()
                .select_only()
                .column(Column::Id)
                .filter(eligible.clone())
                .order_by_asc(Column::CreatedAt)
                .limit(1)
                .into_tuple::<Uuid>()
                .one(&self.db)
                .await?
            else {
                return Ok(None);
            };

            let lease = (now + Duration::seconds(self.lease_seconds)).fixed_offset();
            let result = Entity::update_many()
                .col_expr(Column::Status, Expr::value(JobStatus::Running.as_str()))
                .col_expr(Column::WorkerId, Expr::value(worker_id))
                .col_expr(Column::LeaseExpiresAt, Expr::value(lease))
                .col_expr(
                    Column::StartedAt,
                    Func::coalesce([
                        Expr::col(Column::StartedAt).into(),
                        Expr::value(now.fixed_offset()).into(),
                    ])
                    .into(),
                )
                .filter(Column::Id.eq(candidate_id))
                .filter(eligible)
                .exec(&self.db)
                .await?;

            if result.rows_affected == 1 {
                let job = Entity::find_by_id(candidate_id)
                    .one(&self.db)
                    .await?
                    .ok_or(StoreError::JobNotFound {
                        job_id: candidate_id,
                    })?;

                tracing::debug!(
                    job_id = %job.id,
                    kind = %job.kind,
                    worker_id,
                    "Job claimed"
                );

                return Ok(Some(job));
            }
            // Another worker won this candidate; try the next one.
        }
    }

    /// Report execution progress for a claimed job and extend its lease.
    ///
    /// Accepts fractions in [0.0, 1.0); the value 1.0 is reserved for
    /// `complete`. Progress is monotonically non-decreasing: the conditional
    /// update refuses regressions along with wrong-state and wrong-owner
    /// mutations, all of which surface as a state violation.
    pub async fn report_progress(
        &self,
        job_id: Uuid,
        worker_id: &str,
        fraction: f64,
    ) -> Result<(), StoreError> {
        if !(0.0..1.0).contains(&fraction) {
            return Err(StoreError::InvalidProgress { value: fraction });
        }

        let now = Utc::now();
        let lease = (now + Duration::seconds(self.lease_seconds)).fixed_offset();
        let result = Entity::update_many()
            .col_expr(Column::Progress, Expr::value(fraction))
            .col_expr(Column::LeaseExpiresAt, Expr::value(lease))
            .filter(Column::Id.eq(job_id))
            .filter(Column::Status.eq(JobStatus::Running.as_str()))
            .filter(Column::WorkerId.eq(worker_id))
            .filter(Column::Progress.lte(fraction))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::JobStateViolation {
                job_id,
                expected: "running",
            });
        }

        Ok(())
    }

    /// Transition a claimed job to `completed` with its typed output.
    pub async fn complete(
        &self,
        job_id: Uuid,
        worker_id: &str,
        output: &JobOutput,
    ) -> Result<(), StoreError> {
        let now = Utc::now().fixed_offset();
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(JobStatus::Completed.as_str()))
            .col_expr(Column::Progress, Expr::value(1.0))
            .col_expr(Column::Output, Expr::value(output.to_json()))
            .col_expr(Column::CompletedAt, Expr::value(now))
            .col_expr(Column::LeaseExpiresAt, Expr::value(Option::<DateTime<Utc>>::None))
            .filter(Column::Id.eq(job_id))
            .filter(Column::Status.eq(JobStatus::Running.as_str()))
            .filter(Column::WorkerId.eq(worker_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(self.state_violation(job_id).await);
        }

        tracing::info!(job_id = %job_id, "Job completed");
        Ok(())
    }

    /// Transition a claimed job to `failed` with a human-readable error.
    pub async fn fail(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
    ) -> Result<(), StoreError> {
        let now = Utc::now().fixed_offset();
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(JobStatus::Failed.as_str()))
            .col_expr(Column::Error, Expr::value(error))
            .col_expr(Column::CompletedAt, Expr::value(now))
            .col_expr(Column::LeaseExpiresAt, Expr::value(Option::<DateTime<Utc>>::None))
            .filter(Column::Id.eq(job_id))
            .filter(Column::Status.eq(JobStatus::Running.as_str()))
            .filter(Column::WorkerId.eq(worker_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(self.state_violation(job_id).await);
        }

        tracing::warn!(job_id = %job_id, error, "Job failed");
        Ok(())
    }

    /// Find a job by ID.
    pub async fn find_by_id(&self, job_id: Uuid) -> Result<Option<Model>, StoreError> {
        Ok(Entity::find_by_id(job_id).one(&self.db).await?)
    }

    /// List jobs matching the filter, newest first, with cursor pagination.
    pub async fn list(
        &self,
        filter: &JobFilter,
        limit: u64,
        cursor: Option<JobCursor>,
    ) -> Result<Vec<Model>, StoreError> {
        let mut query = Entity::find()
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .limit(limit);

        if let Some(status) = filter.status {
            query = query.filter(Column::Status.eq(status.as_str()));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(Column::Kind.eq(kind.as_str()));
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

    /// Aggregate counts for the stats endpoint.
    pub async fn stats(&self) -> Result<JobStats, StoreError> {
        let total = Entity::find().count(&self.db).await?;

        let mut by_status = [0u64; 4];
        for (i, status) in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ]
        .into_iter()
        .enumerate()
        {
            by_status[i] = Entity::find()
                .filter(Column::Status.eq(status.as_str()))
                .count(&self.db)
                .await?;
        }

        let mut by_kind = std::collections::BTreeMap::new();
        for kind in JobKind::ALL {
            let count = Entity::find()
                .filter(Column::Kind.eq(kind.as_str()))
                .count(&self.db)
                .await?;
            by_kind.insert(kind.as_str().to_string(), count);
        }

        let cutoff = (Utc::now() - Duration::hours(24)).fixed_offset();
        let recent_24h = Entity::find()
            .filter(Column::CreatedAt.gte(cutoff))
            .count(&self.db)
            .await?;

        let finished = by_status[2] + by_status[3];
        let success_rate = if finished > 0 {
            (by_status[2] as f64 / finished as f64) * 100.0
        } else {
            0.0
        };

        Ok(JobStats {
            total,
            pending: by_status[0],
            running: by_status[1],
            completed: by_status[2],
            failed: by_status[3],
            by_kind,
            recent_24h,
            success_rate,
        })
    }

    /// Delete terminal jobs older than the given number of days. Jobs that
    /// are still pending or running are never deleted.
    pub async fn cleanup_terminal(&self, days_old: u32) -> Result<u64, StoreError> {
        let cutoff = (Utc::now() - Duration::days(days_old as i64)).fixed_offset();
        let result = Entity::delete_many()
            .filter(Column::Status.is_in([
                JobStatus::Completed.as_str(),
                JobStatus::Failed.as_str(),
            ]))
            .filter(Column::CreatedAt.lt(cutoff))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            tracing::info!(deleted = result.rows_affected, days_old, "Cleaned up old jobs");
        }

        Ok(result.rows_affected)
    }

    /// Decode the typed input of a stored job.
    pub fn decode_input(job: &Model) -> Result<JobInput, StoreError> {
        serde_json::from_value(job.input.clone()).map_err(|e| StoreError::MalformedPayload {
            id: job.id,
            details: e.to_string(),
        })
    }

    fn eligibility_condition(kind: JobKind, now: DateTime<Utc>) -> Condition {
        Condition::all()
            .add(Column::Kind.eq(kind.as_str()))
            .add(
                Condition::any()
                    .add(Column::Status.eq(JobStatus::Pending.as_str()))
                    .add(
                        Condition::all()
                            .add(Column::Status.eq(JobStatus::Running.as_str()))
                            .add(Column::LeaseExpiresAt.lt(now.fixed_offset())),
                    ),
            )
    }

    async fn state_violation(&self, job_id: Uuid) -> StoreError {
        match self.find_by_id(job_id).await {
            Ok(Some(_)) => StoreError::JobStateViolation {
                job_id,
                expected: "running",
            },
            Ok(None) => StoreError::JobNotFound { job_id },
            Err(err) => err,
        }
    }
}
