//! Record entity model
//!
//! This module contains the SeaORM entity model for the records table, the
//! content store of deduplicated ingested items. The content hash column
//! carries a unique index; insertion through the record repository treats a
//! constraint hit as a duplicate, not an error.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Record entity representing a content-addressed ingested item
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "records")]
pub struct Model {
    /// Unique identifier for the record (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Opaque reference to the source this record was extracted from
    pub source_ref: String,

    /// Raw extracted payload
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: JsonValue,

    /// SHA-256 hex digest over the payload's canonical identifying fields
    /// (unique across all records)
    pub content_hash: String,

    /// Timestamp when the record was ingested
    pub ingested_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
