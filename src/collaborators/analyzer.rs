//! Analysis collaborator interface
//!
//! The statistical engine itself is an external collaborator consumed as an
//! opaque function from dataset records to analysis outcomes. The pipeline
//! ships a thin volume-based implementation so the service is runnable end
//! to end; anything heavier plugs in behind the same trait.

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use crate::domain::Severity;

/// Non-retryable analysis failure. Re-running a partial statistical
/// computation is not safe to resume blindly, so the worker fails the job on
/// the first error instead of retrying.
#[derive(Debug, Clone, thiserror::Error)]
#[error("analysis failed: {0}")]
pub struct AnalyzeError(pub String);

/// One record handed to the analyzer.
#[derive(Debug, Clone)]
pub struct DatasetRecord {
    pub source_ref: String,
    pub payload: JsonValue,
}

/// One analysis outcome, persisted by the analysis worker.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub category: String,
    pub metrics: JsonValue,
    pub quality_score: Option<f64>,
    pub severity: Severity,
}

/// Contract for the external analysis collaborator.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze a dataset's records for the requested categories. An empty
    /// category list means the analyzer's default set.
    async fn analyze(
        &self,
        dataset_ref: Uuid,
        records: &[DatasetRecord],
        categories: &[String],
    ) -> Result<Vec<AnalysisOutcome>, AnalyzeError>;
}

/// Volume analyzer: per-source record counts and dataset coverage. Severity
/// scales with how thin the dataset is, which is enough to exercise the
/// signal gate in local profiles.
pub struct VolumeAnalyzer {
    /// Datasets below this many records are flagged with elevated severity.
    pub min_dataset_size: usize,
}

impl Default for VolumeAnalyzer {
    fn default() -> Self {
        Self {
            min_dataset_size: 10,
        }
    }
}

#[async_trait]
impl Analyzer for VolumeAnalyzer {
    async fn analyze(
        &self,
        _dataset_ref: Uuid,
        records: &[DatasetRecord],
        categories: &[String],
    ) -> Result<Vec<AnalysisOutcome>, AnalyzeError> {
        if records.is_empty() {
            return Err(AnalyzeError("dataset has no records".to_string()));
        }

        let mut per_source = std::collections::BTreeMap::<&str, usize>::new();
        for record in records {
            *per_source.entry(record.source_ref.as_str()).or_default() += 1;
        }

        let total = records.len();
        let coverage = total as f64 / self.min_dataset_size as f64;
        let severity = if total >= self.min_dataset_size {
            Severity::Low
        } else if total >= self.min_dataset_size / 2 {
            Severity::Medium
        } else {
            Severity::High
        };

        let requested: Vec<String> = if categories.is_empty() {
            vec!["volume".to_string()]
        } else {
            categories.to_vec()
        };

        Ok(requested
            .into_iter()
            .map(|category| AnalysisOutcome {
                category,
                metrics: json!({
                    "record_count": total,
                    "source_count": per_source.len(),
                    "records_per_source": per_source,
                }),
                quality_score: Some(coverage.min(1.0)),
                severity,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source_ref: &str) -> DatasetRecord {
        DatasetRecord {
            source_ref: source_ref.to_string(),
            payload: json!({"title": "x"}),
        }
    }

    #[tokio::test]
    async fn empty_dataset_fails() {
        let analyzer = VolumeAnalyzer::default();
        let result = analyzer.analyze(Uuid::new_v4(), &[], &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn thin_dataset_is_high_severity() {
        let analyzer = VolumeAnalyzer::default();
        let records = vec![record("a"), record("a"), record("b")];
        let outcomes = analyzer.analyze(Uuid::new_v4(), &records, &[]).await.unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].severity, Severity::High);
        assert_eq!(outcomes[0].metrics["record_count"], 3);
        assert_eq!(outcomes[0].metrics["source_count"], 2);
    }

    #[tokio::test]
    async fn one_outcome_per_requested_category() {
        let analyzer = VolumeAnalyzer::default();
        let records: Vec<_> = (0..12).map(|_| record("a")).collect();
        let categories = vec!["volume".to_string(), "engagement".to_string()];
        let outcomes = analyzer
            .analyze(Uuid::new_v4(), &records, &categories)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.severity == Severity::Low));
    }
}
