//! Core domain vocabulary shared across the pipeline.
//!
//! Job kinds and statuses, signal statuses, the four-level severity scale,
//! and the typed job payload shapes stored in the jobs table. Statuses and
//! kinds are persisted as their canonical snake_case strings; payloads are
//! persisted as tagged JSON so the wire shape stays stable while the closed
//! set of shapes is enforced at compile time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

/// Error for parsing a persisted enum string back into its domain type.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {field} value: {value}")]
pub struct ParseEnumError {
    pub field: &'static str,
    pub value: String,
}

/// The three dispatch queues, keyed by job kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Extract,
    Analyze,
    RelaySignal,
}

impl JobKind {
    /// Return the canonical string representation for this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            JobKind::Extract => "extract",
            JobKind::Analyze => "analyze",
            JobKind::RelaySignal => "relay_signal",
        }
    }

    /// All kinds, in dispatch order.
    pub const ALL: [JobKind; 3] = [JobKind::Extract, JobKind::Analyze, JobKind::RelaySignal];
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extract" => Ok(JobKind::Extract),
            "analyze" => Ok(JobKind::Analyze),
            "relay_signal" => Ok(JobKind::RelaySignal),
            other => Err(ParseEnumError {
                field: "job kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Job lifecycle status. Transitions are pending -> running -> completed or
/// failed; terminal states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether this status admits no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(ParseEnumError {
                field: "job status",
                value: other.to_string(),
            }),
        }
    }
}

/// Four-level ordinal severity classification of an analysis result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Fixed numeric ordinal used in the ledger wire payload.
    pub const fn ordinal(self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(ParseEnumError {
                field: "severity",
                value: other.to_string(),
            }),
        }
    }
}

/// Signal lifecycle status. The in-flight submission window is not a
/// persisted status; it is tracked by the attempt_started_at claim marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Pending,
    Sent,
    Failed,
}

impl SignalStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            SignalStatus::Pending => "pending",
            SignalStatus::Sent => "sent",
            SignalStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SignalStatus::Pending),
            "sent" => Ok(SignalStatus::Sent),
            "failed" => Ok(SignalStatus::Failed),
            other => Err(ParseEnumError {
                field: "signal status",
                value: other.to_string(),
            }),
        }
    }
}

/// Fetch configuration for an extraction source, carried inline in the job
/// input so the pipeline never depends on the external CRUD layer's tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Feed or page URLs to fetch.
    pub urls: Vec<String>,
    /// Optional JSON pointer selecting the item array inside each response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_pointer: Option<String>,
    /// Upper bound on items taken per URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

/// Typed job input, tagged by the job kind that consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobInput {
    Extract {
        source_ref: String,
        source: SourceConfig,
    },
    Analyze {
        dataset_ref: Uuid,
        source_refs: Vec<String>,
        #[serde(default)]
        categories: Vec<String>,
    },
    RelaySignal {
        signal_id: Uuid,
    },
}

impl JobInput {
    /// The queue this input belongs on.
    pub const fn kind(&self) -> JobKind {
        match self {
            JobInput::Extract { .. } => JobKind::Extract,
            JobInput::Analyze { .. } => JobKind::Analyze,
            JobInput::RelaySignal { .. } => JobKind::RelaySignal,
        }
    }
}

/// Typed job output, set only on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOutput {
    Extract {
        records_extracted: usize,
        records_new: usize,
        records_duplicate: usize,
    },
    Analyze {
        analyses_created: usize,
        categories: Vec<String>,
    },
    RelaySignal {
        tx_hash: Option<String>,
        skipped_disabled: bool,
    },
}

impl JobOutput {
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).expect("job output serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordinals_are_fixed() {
        assert_eq!(Severity::Low.ordinal(), 1);
        assert_eq!(Severity::Medium.ordinal(), 2);
        assert_eq!(Severity::High.ordinal(), 3);
        assert_eq!(Severity::Critical.ordinal(), 4);
    }

    #[test]
    fn severity_ordering_follows_ordinals() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn job_kind_round_trips_through_str() {
        for kind in JobKind::ALL {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!("aggregate".parse::<JobKind>().is_err());
    }

    #[test]
    fn job_input_json_is_tagged_by_kind() {
        let input = JobInput::RelaySignal {
            signal_id: Uuid::new_v4(),
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["kind"], "relay_signal");
        let back: JobInput = serde_json::from_value(json).unwrap();
        assert_eq!(back, input);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
