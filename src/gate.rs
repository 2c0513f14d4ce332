//! # Signal Gate
//!
//! Policy deciding whether an analysis result merits ledger transmission.
//! Severity below the configured threshold is rejected outright; otherwise
//! a pending signal is created (idempotently, one per analysis result) and
//! a relay job is enqueued to carry it. Callers may invoke the gate any
//! number of times for the same result.

use metrics::counter;
use uuid::Uuid;

use crate::config::OracleConfig;
use crate::domain::{JobInput, Severity};
use crate::error::StoreError;
use crate::models::analysis_result::Model as AnalysisResult;
use crate::models::signal::Model as Signal;
use crate::oracle::signal_digest;
use crate::repositories::signal::CreateSignalOutcome;
use crate::repositories::{JobRepository, SignalRepository};

/// The gate between analysis results and ledger transmission.
#[derive(Clone)]
pub struct SignalGate {
    oracle: OracleConfig,
    signals: SignalRepository,
    jobs: JobRepository,
}

impl SignalGate {
    pub fn new(oracle: OracleConfig, signals: SignalRepository, jobs: JobRepository) -> Self {
        Self {
            oracle,
            signals,
            jobs,
        }
    }

    /// Create and enqueue a signal for the analysis result if it qualifies.
    ///
    /// Returns `None` when the severity is below the threshold or a signal
    /// already exists for this result. Signal creation happens even when
    /// relay itself is disabled, so the audit trail is complete either way.
    pub async fn maybe_signal(
        &self,
        analysis: &AnalysisResult,
    ) -> Result<Option<Signal>, StoreError> {
        let severity: Severity = match analysis.severity.parse() {
            Ok(severity) => severity,
            Err(err) => {
                return Err(StoreError::MalformedPayload {
                    id: analysis.id,
                    details: err.to_string(),
                });
            }
        };

        if severity < self.oracle.min_severity {
            tracing::debug!(
                analysis_result_id = %analysis.id,
                severity = %severity,
                "Severity below signal threshold"
            );
            return Ok(None);
        }

        let digest = signal_digest(
            analysis.id,
            severity,
            &analysis.metrics,
            self.oracle.metrics_digest_cap,
            self.oracle.chain_id,
        );

        let signal = match self
            .signals
            .create_for_analysis(analysis.id, severity, &digest)
            .await?
        {
            CreateSignalOutcome::Created(signal) => signal,
            CreateSignalOutcome::AlreadyExists => return Ok(None),
        };

        counter!("signals_created_total", "severity" => severity.as_str()).increment(1);

        self.enqueue_relay(signal.id).await?;

        Ok(Some(*signal))
    }

    /// Enqueue a fresh relay job for a signal. Also used by the operator
    /// retry path after a signal has been reset.
    pub async fn enqueue_relay(&self, signal_id: Uuid) -> Result<(), StoreError> {
        let job = self
            .jobs
            .create(&JobInput::RelaySignal { signal_id })
            .await?;

        tracing::info!(
            signal_id = %signal_id,
            job_id = %job.id,
            "Relay job enqueued"
        );

        Ok(())
    }
}
