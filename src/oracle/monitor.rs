//! # Relay Monitor
//!
//! Standalone periodic sweep over pending signals, independent of the
//! dispatch queues. Each pass re-attempts transmission for every pending
//! high-or-above signal using the same relay path as the queue-triggered
//! worker; the attempt CAS keeps the two from double-submitting. A failure
//! on one signal is logged and the sweep moves on, so a single bad signal
//! never halts monitoring.

use std::sync::Arc;

use metrics::{counter, gauge, histogram};
use tokio::time::{Duration as TokioDuration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::config::{MonitorConfig, OracleConfig};
use crate::repositories::SignalRepository;

use super::relay::{RelayOutcome, SignalRelay};

/// Background monitor service.
pub struct RelayMonitor {
    config: MonitorConfig,
    oracle: OracleConfig,
    signals: SignalRepository,
    relay: Arc<SignalRelay>,
}

#[derive(Debug, Default)]
struct SweepStats {
    examined: u64,
    sent: u64,
    failed: u64,
    lost_race: u64,
    errors: u64,
}

impl RelayMonitor {
    /// Create a new monitor instance.
    pub fn new(
        config: MonitorConfig,
        oracle: OracleConfig,
        signals: SignalRepository,
        relay: Arc<SignalRelay>,
    ) -> Self {
        Self {
            config,
            oracle,
            signals,
            relay,
        }
    }

    /// Run the monitor loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting relay monitor");
        let interval = TokioDuration::from_secs(self.config.sweep_interval_seconds);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Relay monitor shutdown requested");
                    break;
                }
                _ = sleep(interval) => {
                    let sweep_started = Instant::now();
                    if let Err(err) = self.sweep().await {
                        error!(error = ?err, "Monitor sweep failed");
                    }
                    histogram!("monitor_sweep_duration_ms")
                        .record(sweep_started.elapsed().as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Relay monitor stopped");
    }

    /// Run a single sweep over pending signals.
    pub async fn sweep(&self) -> Result<(), crate::error::StoreError> {
        if !self.relay.is_enabled() {
            debug!("Ledger relay disabled; monitor sweep skipped");
            return Ok(());
        }

        let pending = self
            .signals
            .list_pending(self.oracle.min_severity, self.config.sweep_batch)
            .await?;

        gauge!("monitor_pending_signals").set(pending.len() as f64);

        let mut stats = SweepStats::default();

        for signal in pending {
            stats.examined += 1;

            // One bad signal must not stop the sweep; log and continue.
            match self.relay.relay_signal(signal.id).await {
                Ok(RelayOutcome::Sent { tx_hash }) => {
                    stats.sent += 1;
                    info!(
                        signal_id = %signal.id,
                        tx_hash = %tx_hash,
                        "Monitor transmitted stuck signal"
                    );
                }
                Ok(RelayOutcome::Failed { error }) => {
                    stats.failed += 1;
                    debug!(signal_id = %signal.id, error, "Monitor relay attempt failed");
                }
                Ok(RelayOutcome::LostRace) => {
                    stats.lost_race += 1;
                }
                Ok(RelayOutcome::Disabled) => {
                    // Capability flipped off mid-sweep; the next pass will
                    // short-circuit at the top.
                    break;
                }
                Err(err) => {
                    stats.errors += 1;
                    error!(
                        signal_id = %signal.id,
                        error = ?err,
                        "Monitor failed to process signal"
                    );
                }
            }
        }

        counter!("monitor_signals_sent_total").increment(stats.sent);

        debug!(
            examined = stats.examined,
            sent = stats.sent,
            failed = stats.failed,
            lost_race = stats.lost_race,
            errors = stats.errors,
            "Monitor sweep completed"
        );

        Ok(())
    }
}
