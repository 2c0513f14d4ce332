//! # Analysis Result Repository
//!
//! Persistence for analysis outcomes. Rows are written once by the analysis
//! worker and read by the signal gate and the operator surface.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::domain::Severity;
use crate::error::StoreError;
use crate::models::analysis_result::{ActiveModel, Column, Entity, Model};

/// A new analysis outcome produced by the analysis collaborator.
#[derive(Debug, Clone)]
pub struct NewAnalysisResult {
    pub dataset_ref: Uuid,
    pub category: String,
    pub metrics: JsonValue,
    pub quality_score: Option<f64>,
    pub severity: Severity,
}

/// Repository for analysis result operations
#[derive(Clone)]
pub struct AnalysisRepository {
    db: DatabaseConnection,
}

impl AnalysisRepository {
    /// Create a new AnalysisRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert one analysis result.
    pub async fn insert(&self, new: NewAnalysisResult) -> Result<Model, StoreError> {
        let result = ActiveModel {
            id: Set(Uuid::new_v4()),
            dataset_ref: Set(new.dataset_ref),
            category: Set(new.category),
            metrics: Set(new.metrics),
            quality_score: Set(new.quality_score),
            severity: Set(new.severity.as_str().to_string()),
            created_at: Set(Utc::now().fixed_offset()),
        };

        Ok(result.insert(&self.db).await?)
    }

    /// Find an analysis result by ID.
    pub async fn find_by_id(&self, analysis_id: Uuid) -> Result<Option<Model>, StoreError> {
        Ok(Entity::find_by_id(analysis_id).one(&self.db).await?)
    }

    /// Find an analysis result by ID, erroring when absent.
    pub async fn get(&self, analysis_id: Uuid) -> Result<Model, StoreError> {
        self.find_by_id(analysis_id)
            .await?
            .ok_or(StoreError::AnalysisNotFound { analysis_id })
    }

    /// List results for a dataset, newest first.
    pub async fn list_by_dataset(&self, dataset_ref: Uuid) -> Result<Vec<Model>, StoreError> {
        use sea_orm::QueryOrder;

        Ok(Entity::find()
            .filter(Column::DatasetRef.eq(dataset_ref))
            .order_by_desc(Column::CreatedAt)
            .all(&self.db)
            .await?)
    }
}
