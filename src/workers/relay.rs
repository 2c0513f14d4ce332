//! Relay job body.
//!
//! Thin adapter between the job executor and the relay state machine: a
//! confirmed transmission or a no-op (disabled relay, lost race) completes
//! the job, and a failed attempt fails it with the captured error.

use tracing::info;
use uuid::Uuid;

use crate::domain::JobOutput;
use crate::oracle::RelayOutcome;

use super::WorkerContext;

/// Execute one relay job. Returns the typed output on success or the error
/// text destined for the job's `error` field.
pub async fn run(ctx: &WorkerContext, signal_id: Uuid) -> Result<JobOutput, String> {
    info!(signal_id = %signal_id, "Starting signal relay");

    match ctx
        .relay
        .relay_signal(signal_id)
        .await
        .map_err(|e| e.to_string())?
    {
        RelayOutcome::Sent { tx_hash } => Ok(JobOutput::RelaySignal {
            tx_hash: Some(tx_hash),
            skipped_disabled: false,
        }),
        RelayOutcome::Disabled => Ok(JobOutput::RelaySignal {
            tx_hash: None,
            skipped_disabled: true,
        }),
        // Another worker already owns (or finished) this signal's attempt;
        // the job completes having taken no action.
        RelayOutcome::LostRace => Ok(JobOutput::RelaySignal {
            tx_hash: None,
            skipped_disabled: false,
        }),
        RelayOutcome::Failed { error } => Err(error),
    }
}
