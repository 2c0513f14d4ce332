//! Signal relay: the per-attempt ledger transaction lifecycle.
//!
//! One attempt moves a pending signal through assemble -> sign -> submit ->
//! await receipt. The in-flight window is claimed with a store-level CAS
//! before any network call, so the queue-triggered worker and the monitor
//! sweep can race on the same signal and exactly one of them submits. Every
//! failure mode of the attempt lands the signal in `failed`; nothing here
//! retries implicitly.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use uuid::Uuid;

use crate::config::OracleConfig;
use crate::domain::Severity;
use crate::error::StoreError;
use crate::repositories::{AnalysisRepository, SignalRepository};

use super::ledger::{Ledger, ReceiptOutcome};
use super::payload::SignalTxPayload;

/// Outcome of one relay attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The transaction confirmed; the signal is now `sent`.
    Sent { tx_hash: String },
    /// Relay is disabled by configuration; the signal stays `pending` for
    /// audit and no network call was made.
    Disabled,
    /// Another worker owns this signal's attempt (or it is no longer
    /// pending); no action was taken.
    LostRace,
    /// The attempt failed; the signal is now `failed` and the error text is
    /// suitable for the owning job's error field.
    Failed { error: String },
}

/// Executes relay attempts against the configured ledger.
pub struct SignalRelay {
    oracle: OracleConfig,
    signals: SignalRepository,
    analyses: AnalysisRepository,
    ledger: Option<Arc<dyn Ledger>>,
}

impl SignalRelay {
    pub fn new(
        oracle: OracleConfig,
        signals: SignalRepository,
        analyses: AnalysisRepository,
        ledger: Option<Arc<dyn Ledger>>,
    ) -> Self {
        Self {
            oracle,
            signals,
            analyses,
            ledger,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.oracle.enabled && self.ledger.is_some()
    }

    /// Run one relay attempt for the signal.
    ///
    /// Store errors bubble up; everything that belongs to the attempt itself
    /// (signing, rpc, receipt failure, receipt timeout) is folded into
    /// [`RelayOutcome::Failed`] after the signal has been marked.
    pub async fn relay_signal(&self, signal_id: Uuid) -> Result<RelayOutcome, StoreError> {
        let signal = self.signals.get(signal_id).await?;

        if !self.is_enabled() {
            tracing::info!(signal_id = %signal_id, "Ledger relay disabled; leaving signal pending");
            counter!("relay_skipped_disabled_total").increment(1);
            return Ok(RelayOutcome::Disabled);
        }

        // Claim the attempt before any network traffic. Losing the CAS means
        // another worker is already submitting (or the signal left pending).
        if !self
            .signals
            .begin_attempt(signal_id, self.oracle.attempt_ttl_seconds)
            .await?
        {
            tracing::debug!(signal_id = %signal_id, "Lost relay attempt race; taking no action");
            counter!("relay_lost_race_total").increment(1);
            return Ok(RelayOutcome::LostRace);
        }

        // Payload assembly failures are attempt failures like any other:
        // the signal lands in `failed` instead of keeping the attempt marker.
        let analysis = match self.analyses.get(signal.analysis_result_id).await {
            Ok(analysis) => analysis,
            Err(StoreError::AnalysisNotFound { .. }) => {
                let error = format!(
                    "analysis result {} not found for signal",
                    signal.analysis_result_id
                );
                self.signals.mark_failed(signal_id, None).await?;
                counter!("relay_failed_total", "stage" => "build").increment(1);
                tracing::warn!(signal_id = %signal_id, error, "Payload assembly failed");
                return Ok(RelayOutcome::Failed { error });
            }
            Err(err) => return Err(err),
        };

        let severity = match signal.severity.parse::<Severity>() {
            Ok(severity) => severity,
            Err(err) => {
                let error = err.to_string();
                self.signals.mark_failed(signal_id, None).await?;
                counter!("relay_failed_total", "stage" => "build").increment(1);
                tracing::warn!(signal_id = %signal_id, error, "Payload assembly failed");
                return Ok(RelayOutcome::Failed { error });
            }
        };

        let payload = SignalTxPayload::build(
            analysis.id,
            severity,
            &analysis.metrics,
            self.oracle.metrics_digest_cap,
            self.oracle.chain_id,
        );

        let ledger = self.ledger.as_ref().expect("checked by is_enabled");
        let started = std::time::Instant::now();

        let tx_hash = match ledger.sign_and_submit(&payload).await {
            Ok(tx_hash) => tx_hash,
            Err(err) => {
                // Submission never reached the network with a hash; the
                // signal fails with tx_hash left empty.
                let error = err.to_string();
                self.signals.mark_failed(signal_id, None).await?;
                counter!("relay_failed_total", "stage" => "submit").increment(1);
                tracing::warn!(signal_id = %signal_id, error, "Ledger submission failed");
                return Ok(RelayOutcome::Failed { error });
            }
        };

        let timeout = Duration::from_secs(self.oracle.receipt_timeout_seconds);
        let outcome = match ledger.await_receipt(&tx_hash, timeout).await {
            Ok(ReceiptOutcome::Success) => {
                if self.signals.mark_sent(signal_id, &tx_hash).await? {
                    histogram!("relay_confirm_duration_ms")
                        .record(started.elapsed().as_secs_f64() * 1_000.0);
                    counter!("relay_sent_total").increment(1);
                    tracing::info!(
                        signal_id = %signal_id,
                        tx_hash = %tx_hash,
                        "Signal confirmed on ledger"
                    );
                    RelayOutcome::Sent { tx_hash }
                } else {
                    // The signal left pending underneath us; nothing to do.
                    tracing::warn!(
                        signal_id = %signal_id,
                        tx_hash = %tx_hash,
                        "Signal no longer pending after confirmation"
                    );
                    RelayOutcome::LostRace
                }
            }
            Ok(ReceiptOutcome::Failure) => {
                let error = format!("ledger transaction {tx_hash} confirmed with failure status");
                self.signals.mark_failed(signal_id, Some(&tx_hash)).await?;
                counter!("relay_failed_total", "stage" => "receipt").increment(1);
                tracing::warn!(signal_id = %signal_id, tx_hash = %tx_hash, "Transaction failed");
                RelayOutcome::Failed { error }
            }
            Ok(ReceiptOutcome::Timeout) => {
                // The transaction may still confirm out-of-band later; the
                // recorded tx_hash is the operator's reconciliation handle.
                let error = format!(
                    "ledger receipt timed out after {}s (tx {tx_hash})",
                    self.oracle.receipt_timeout_seconds
                );
                self.signals.mark_failed(signal_id, Some(&tx_hash)).await?;
                counter!("relay_failed_total", "stage" => "timeout").increment(1);
                tracing::warn!(signal_id = %signal_id, tx_hash = %tx_hash, "Receipt wait timed out");
                RelayOutcome::Failed { error }
            }
            Err(err) => {
                let error = format!("receipt lookup failed for tx {tx_hash}: {err}");
                self.signals.mark_failed(signal_id, Some(&tx_hash)).await?;
                counter!("relay_failed_total", "stage" => "receipt").increment(1);
                tracing::warn!(signal_id = %signal_id, error, "Receipt lookup failed");
                RelayOutcome::Failed { error }
            }
        };

        Ok(outcome)
    }
}
