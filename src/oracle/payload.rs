//! Canonical ledger transaction payloads.
//!
//! A signal transaction carries `(analysis_id, severity ordinal, timestamp,
//! metrics digest)` plus the chain id. The metrics digest covers a capped
//! number of metrics taken in sorted-key order, so the digest is
//! deterministic for a given metrics map regardless of JSON object ordering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::Severity;

/// The canonical transaction payload submitted to the ledger gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalTxPayload {
    pub analysis_id: Uuid,
    pub severity_level: u8,
    pub timestamp: i64,
    pub metrics_digest: String,
    pub chain_id: u64,
}

impl SignalTxPayload {
    /// Build a payload for one submission attempt. The timestamp is attempt
    /// time, so retries always produce a fresh transaction rather than
    /// reusing a stale one.
    pub fn build(
        analysis_id: Uuid,
        severity: Severity,
        metrics: &JsonValue,
        metrics_cap: usize,
        chain_id: u64,
    ) -> Self {
        Self {
            analysis_id,
            severity_level: severity.ordinal(),
            timestamp: chrono::Utc::now().timestamp(),
            metrics_digest: metrics_digest(metrics, metrics_cap),
            chain_id,
        }
    }

    /// Canonical byte encoding: JSON with the struct's fixed field order.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("payload serializes")
    }
}

/// SHA-256 hex digest over the first `cap` metrics in sorted-key order.
pub fn metrics_digest(metrics: &JsonValue, cap: usize) -> String {
    let subject: JsonValue = match metrics.as_object() {
        Some(object) => {
            let sorted: BTreeMap<&String, &JsonValue> = object.iter().collect();
            let capped: BTreeMap<&String, &JsonValue> =
                sorted.into_iter().take(cap).collect();
            serde_json::to_value(capped).expect("metrics map serializes")
        }
        None => metrics.clone(),
    };

    let bytes = serde_json::to_vec(&subject).expect("metrics serialize");
    hex::encode(Sha256::digest(&bytes))
}

/// Stable digest identifying a signal's payload, recorded on the signal row
/// at creation time. Excludes the per-attempt timestamp so the digest stays
/// constant across retries of the same signal.
pub fn signal_digest(
    analysis_id: Uuid,
    severity: Severity,
    metrics: &JsonValue,
    metrics_cap: usize,
    chain_id: u64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(analysis_id.as_bytes());
    hasher.update([severity.ordinal()]);
    hasher.update(chain_id.to_be_bytes());
    hasher.update(metrics_digest(metrics, metrics_cap).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metrics_digest_is_order_independent() {
        let a = json!({"alpha": 1, "beta": 2, "gamma": 3});
        let b = json!({"gamma": 3, "alpha": 1, "beta": 2});
        assert_eq!(metrics_digest(&a, 5), metrics_digest(&b, 5));
    }

    #[test]
    fn metrics_digest_cap_is_stable_under_reordering() {
        // With a cap smaller than the map, the kept subset is the first N
        // sorted keys, not the first N in arrival order.
        let a = json!({"a": 1, "b": 2, "c": 3, "d": 4});
        let b = json!({"d": 4, "c": 3, "b": 2, "a": 1});
        assert_eq!(metrics_digest(&a, 2), metrics_digest(&b, 2));

        // The capped digest differs from the full digest.
        assert_ne!(metrics_digest(&a, 2), metrics_digest(&a, 4));
    }

    #[test]
    fn metrics_digest_ignores_values_beyond_cap() {
        let a = json!({"a": 1, "b": 2, "z": 100});
        let b = json!({"a": 1, "b": 2, "z": 999});
        assert_eq!(metrics_digest(&a, 2), metrics_digest(&b, 2));
    }

    #[test]
    fn signal_digest_is_stable_across_attempts() {
        let analysis_id = Uuid::new_v4();
        let metrics = json!({"alpha": 1});
        let first = signal_digest(analysis_id, Severity::Critical, &metrics, 5, 1);
        let second = signal_digest(analysis_id, Severity::Critical, &metrics, 5, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn payload_severity_levels_match_ordinals() {
        let payload = SignalTxPayload::build(
            Uuid::new_v4(),
            Severity::Critical,
            &json!({"alpha": 1}),
            5,
            1,
        );
        assert_eq!(payload.severity_level, 4);
        assert_eq!(payload.chain_id, 1);
        assert!(payload.timestamp > 0);
    }
}
