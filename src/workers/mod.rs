//! Background workers serving the dispatch queues.
//!
//! One [`executor::JobExecutor`] per job kind polls the ledger, claims
//! eligible jobs, and runs the matching job body. Collaborator failures are
//! converted into failed jobs at this boundary; the loops themselves never
//! die.

pub mod analysis;
pub mod executor;
pub mod extraction;
pub mod relay;

use std::sync::Arc;

use crate::collaborators::{Analyzer, Extractor};
use crate::config::AppConfig;
use crate::gate::SignalGate;
use crate::oracle::SignalRelay;
use crate::repositories::{AnalysisRepository, JobRepository, RecordRepository, SignalRepository};

pub use executor::JobExecutor;

/// Shared dependencies handed to every worker.
pub struct WorkerContext {
    pub config: Arc<AppConfig>,
    pub jobs: JobRepository,
    pub records: RecordRepository,
    pub analyses: AnalysisRepository,
    pub signals: SignalRepository,
    pub gate: SignalGate,
    pub relay: Arc<SignalRelay>,
    pub extractor: Arc<dyn Extractor>,
    pub analyzer: Arc<dyn Analyzer>,
}
