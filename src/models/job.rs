//! Job entity model
//!
//! This module contains the SeaORM entity model for the jobs table, the
//! durable ledger of background work units. Status transitions are pending ->
//! running -> completed/failed and are enforced by conditional updates in the
//! job repository, never by read-then-write.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Job entity representing a tracked unit of asynchronous work
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    /// Unique identifier for the job (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Dispatch queue this job belongs to (extract, analyze, relay_signal)
    pub kind: String,

    /// Current lifecycle status (pending, running, completed, failed)
    pub status: String,

    /// Fraction of work done, in [0.0, 1.0]; monotonically non-decreasing
    /// while running and 1.0 only on completion
    pub progress: f64,

    /// Typed input payload, tagged by job kind
    #[sea_orm(column_type = "JsonBinary")]
    pub input: JsonValue,

    /// Typed output payload, set only on completion
    #[sea_orm(column_type = "JsonBinary")]
    pub output: Option<JsonValue>,

    /// Human-readable error text, set only on failure
    pub error: Option<String>,

    /// Identifier of the worker currently (or last) holding the claim
    pub worker_id: Option<String>,

    /// Claim lease deadline; an expired lease makes a running job reclaimable
    pub lease_expires_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the job was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the job was first claimed
    pub started_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the job reached a terminal state
    pub completed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
