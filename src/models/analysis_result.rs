//! AnalysisResult entity model
//!
//! Analysis results are produced by the analysis worker and immutable once
//! inserted. The signal gate consumes them to decide whether a ledger
//! transmission is warranted.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// AnalysisResult entity representing one analysis outcome for a dataset
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "analysis_results")]
pub struct Model {
    /// Unique identifier for the analysis result (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Dataset the analysis was computed over
    pub dataset_ref: Uuid,

    /// Analysis category (e.g. sentiment, trend, engagement)
    pub category: String,

    /// Computed metrics, opaque to the pipeline
    #[sea_orm(column_type = "JsonBinary")]
    pub metrics: JsonValue,

    /// Overall quality score of the underlying dataset
    pub quality_score: Option<f64>,

    /// Severity classification (low, medium, high, critical)
    pub severity: String,

    /// Timestamp when the result was created
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::signal::Entity")]
    Signal,
}

impl Related<super::signal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Signal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
