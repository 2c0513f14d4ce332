//! # Record Repository
//!
//! The content store and its dedup gate. `insert_if_new` computes a content
//! hash over the payload's canonical identifying fields and inserts the row;
//! the unique index on `content_hash` makes check-then-insert atomic per
//! hash, so a constraint hit is the normal duplicate outcome rather than a
//! race or an error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{StoreError, is_unique_violation};
use crate::models::record::{ActiveModel, Column, Entity, Model};

/// Payload fields that identify a record. Volatile fields (fetch timestamps,
/// engagement counters) are deliberately excluded so incidental reordering
/// or decoration does not defeat deduplication.
const IDENTIFYING_FIELDS: [&str; 4] = ["external_id", "url", "title", "body"];

/// Outcome of a dedup insert. Duplicate is not an error; workers surface it
/// only as a counter in the job output.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupOutcome {
    Inserted(Box<Model>),
    Duplicate,
}

impl DedupOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, DedupOutcome::Inserted(_))
    }
}

/// Compute the SHA-256 hex digest of the payload's canonical identifying
/// fields: a key-sorted JSON object containing only the identifying fields
/// that are present. Key sorting makes the digest independent of field
/// order in the incoming payload.
pub fn content_hash(payload: &JsonValue) -> String {
    let mut canonical = BTreeMap::new();
    if let Some(object) = payload.as_object() {
        for field in IDENTIFYING_FIELDS {
            if let Some(value) = object.get(field)
                && !value.is_null()
            {
                canonical.insert(field, value.clone());
            }
        }
    }

    // Non-object or identifier-free payloads fall back to hashing the whole
    // canonicalized value so they still dedupe on exact repeats.
    let subject = if canonical.is_empty() {
        payload.clone()
    } else {
        serde_json::to_value(&canonical).expect("canonical map serializes")
    };

    let bytes = serde_json::to_vec(&subject).expect("canonical payload serializes");
    hex::encode(Sha256::digest(&bytes))
}

/// Repository for content store operations
#[derive(Clone)]
pub struct RecordRepository {
    db: DatabaseConnection,
}

impl RecordRepository {
    /// Create a new RecordRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a record unless one with the same content hash already exists.
    pub async fn insert_if_new(
        &self,
        source_ref: &str,
        payload: JsonValue,
    ) -> Result<DedupOutcome, StoreError> {
        let hash = content_hash(&payload);

        let record = ActiveModel {
            id: Set(Uuid::new_v4()),
            source_ref: Set(source_ref.to_string()),
            payload: Set(payload),
            content_hash: Set(hash),
            ingested_at: Set(Utc::now().fixed_offset()),
        };

        match record.insert(&self.db).await {
            Ok(model) => Ok(DedupOutcome::Inserted(Box::new(model))),
            Err(err) if is_unique_violation(&err) => {
                tracing::debug!(source_ref, "Duplicate record dropped");
                Ok(DedupOutcome::Duplicate)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Load all records for the given source refs, oldest first.
    pub async fn list_by_sources(&self, source_refs: &[String]) -> Result<Vec<Model>, StoreError> {
        if source_refs.is_empty() {
            return Ok(Vec::new());
        }

        Ok(Entity::find()
            .filter(Column::SourceRef.is_in(source_refs.iter().map(String::as_str)))
            .order_by_asc(Column::IngestedAt)
            .all(&self.db)
            .await?)
    }

    /// Count records ingested since the given instant.
    pub async fn count_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(Entity::find()
            .filter(Column::IngestedAt.gte(since.fixed_offset()))
            .count(&self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_hash_ignores_field_order() {
        let a = json!({"url": "https://example.com/a", "title": "Alpha", "body": "text"});
        let b = json!({"body": "text", "title": "Alpha", "url": "https://example.com/a"});
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn content_hash_ignores_volatile_fields() {
        let a = json!({"url": "https://example.com/a", "title": "Alpha"});
        let b = json!({
            "url": "https://example.com/a",
            "title": "Alpha",
            "fetched_at": "2025-12-01T00:00:00Z",
            "likes": 42
        });
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn content_hash_distinguishes_identifying_fields() {
        let a = json!({"url": "https://example.com/a", "title": "Alpha"});
        let b = json!({"url": "https://example.com/b", "title": "Alpha"});
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn content_hash_falls_back_to_full_payload() {
        let a = json!({"metric": 1.5});
        let b = json!({"metric": 2.5});
        assert_ne!(content_hash(&a), content_hash(&b));
        assert_eq!(content_hash(&a), content_hash(&a.clone()));
    }
}
