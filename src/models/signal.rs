//! Signal entity model
//!
//! This module contains the SeaORM entity model for the signals table. A
//! signal is a ledger-transmission intent derived from exactly one analysis
//! result; the unique index on analysis_result_id enforces that cardinality
//! at the storage layer.

use super::analysis_result::Entity as AnalysisResult;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Signal entity representing a ledger-transmission intent
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "signals")]
pub struct Model {
    /// Unique identifier for the signal (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Analysis result this signal was derived from (unique)
    pub analysis_result_id: Uuid,

    /// Severity inherited from the analysis result (high or critical)
    pub severity: String,

    /// SHA-256 hex digest of the canonical transaction payload
    pub payload_digest: String,

    /// Current transmission status (pending, sent, failed)
    pub status: String,

    /// Ledger transaction hash; set if and only if a submission reached the
    /// network
    pub tx_hash: Option<String>,

    /// Whether the transaction was confirmed; meaningful only when sent
    pub tx_confirmed: bool,

    /// In-flight claim marker for the current submission attempt; cleared on
    /// completion, reclaimable after the configured TTL if the worker died
    pub attempt_started_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the signal was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the signal was successfully sent
    pub sent_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "AnalysisResult",
        from = "Column::AnalysisResultId",
        to = "super::analysis_result::Column::Id"
    )]
    AnalysisResult,
}

impl Related<AnalysisResult> for Entity {
    fn to() -> RelationDef {
        Relation::AnalysisResult.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
