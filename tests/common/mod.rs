//! Shared helpers for integration tests: an in-memory database with the full
//! schema applied, scripted collaborator fakes, and a worker context wired
//! the way the server wires the real one.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use uuid::Uuid;

use migration::{Migrator, MigratorTrait};
use watchtower::collaborators::{
    AnalysisOutcome, AnalyzeError, Analyzer, DatasetRecord, ExtractError, Extractor,
};
use watchtower::config::AppConfig;
use watchtower::domain::{Severity, SourceConfig};
use watchtower::gate::SignalGate;
use watchtower::models::analysis_result::Model as AnalysisResult;
use watchtower::oracle::{Ledger, LedgerError, ReceiptOutcome, SignalRelay, SignalTxPayload};
use watchtower::repositories::analysis::NewAnalysisResult;
use watchtower::repositories::{
    AnalysisRepository, JobRepository, RecordRepository, SignalRepository,
};
use watchtower::workers::WorkerContext;

/// Connect an in-memory SQLite database with the schema applied. A single
/// pooled connection keeps every task on the same database while still
/// interleaving at await points.
pub async fn setup_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);

    let db = Database::connect(opt)
        .await
        .expect("connect in-memory sqlite");
    Migrator::up(&db, None).await.expect("apply migrations");
    db
}

/// Baseline test configuration: relay enabled, tight timings.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.operator_tokens = vec!["test-operator-token".to_string()];
    config.oracle.enabled = true;
    config.oracle.endpoint = Some("http://localhost:0".to_string());
    config.oracle.credential = Some("deadbeefcafebabe".to_string());
    config.oracle.receipt_timeout_seconds = 5;
    config.oracle.attempt_ttl_seconds = 60;
    config.extract_retry.base_seconds = 0;
    config.extract_retry.max_seconds = 0;
    config.extract_retry.jitter_factor = 0.0;
    config
}

/// Extractor replaying a scripted sequence of results, one per call.
pub struct ScriptedExtractor {
    results: Mutex<VecDeque<Result<Vec<JsonValue>, ExtractError>>>,
    pub calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn new(results: Vec<Result<Vec<JsonValue>, ExtractError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(&self, _source: &SourceConfig) -> Result<Vec<JsonValue>, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .await
            .pop_front()
            .expect("scripted extractor exhausted")
    }
}

/// Analyzer returning a fixed set of outcomes (or a fixed error).
pub struct FixedAnalyzer {
    pub outcomes: Vec<AnalysisOutcome>,
    pub error: Option<String>,
    pub calls: AtomicUsize,
}

impl FixedAnalyzer {
    pub fn ok(outcomes: Vec<AnalysisOutcome>) -> Self {
        Self {
            outcomes,
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcomes: Vec::new(),
            error: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Analyzer for FixedAnalyzer {
    async fn analyze(
        &self,
        _dataset_ref: Uuid,
        _records: &[DatasetRecord],
        _categories: &[String],
    ) -> Result<Vec<AnalysisOutcome>, AnalyzeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(message) => Err(AnalyzeError(message.clone())),
            None => Ok(self.outcomes.clone()),
        }
    }
}

/// Behavior of the fake ledger for one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerScript {
    /// Submission succeeds and the receipt confirms success.
    Confirm,
    /// Submission succeeds but the receipt reports failure.
    FailReceipt,
    /// Submission succeeds and no receipt ever arrives.
    Timeout,
    /// Submission itself errors before producing a hash.
    SubmitError,
}

/// Ledger double that records how many submissions reached it. Per-call
/// scripts (consumed in submission order) override the default behavior,
/// letting one test mix failing and succeeding attempts.
pub struct FakeLedger {
    default: LedgerScript,
    scripts: std::sync::Mutex<VecDeque<LedgerScript>>,
    tx_scripts: std::sync::Mutex<std::collections::HashMap<String, LedgerScript>>,
    submit_delay: Duration,
    pub submissions: AtomicUsize,
}

impl FakeLedger {
    pub fn new(default: LedgerScript) -> Self {
        Self {
            default,
            scripts: std::sync::Mutex::new(VecDeque::new()),
            tx_scripts: std::sync::Mutex::new(std::collections::HashMap::new()),
            submit_delay: Duration::ZERO,
            submissions: AtomicUsize::new(0),
        }
    }

    /// Queue per-call scripts ahead of the default behavior.
    pub fn with_scripts(self, scripts: Vec<LedgerScript>) -> Self {
        *self.scripts.lock().unwrap() = scripts.into();
        self
    }

    /// Add latency to submissions to widen race windows.
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    fn next_script(&self) -> LedgerScript {
        self.scripts.lock().unwrap().pop_front().unwrap_or(self.default)
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn sign_and_submit(&self, _payload: &SignalTxPayload) -> Result<String, LedgerError> {
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }

        let script = self.next_script();
        if script == LedgerScript::SubmitError {
            return Err(LedgerError::Rpc("gateway unreachable".to_string()));
        }

        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        let tx_hash = format!("0x{n:064x}");
        self.tx_scripts
            .lock()
            .unwrap()
            .insert(tx_hash.clone(), script);
        Ok(tx_hash)
    }

    async fn await_receipt(
        &self,
        tx_hash: &str,
        _timeout: Duration,
    ) -> Result<ReceiptOutcome, LedgerError> {
        let script = self
            .tx_scripts
            .lock()
            .unwrap()
            .get(tx_hash)
            .copied()
            .unwrap_or(self.default);

        match script {
            LedgerScript::Confirm | LedgerScript::SubmitError => Ok(ReceiptOutcome::Success),
            LedgerScript::FailReceipt => Ok(ReceiptOutcome::Failure),
            LedgerScript::Timeout => Ok(ReceiptOutcome::Timeout),
        }
    }
}

/// Everything a worker-level test needs, wired like the real server.
pub struct TestHarness {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub jobs: JobRepository,
    pub records: RecordRepository,
    pub analyses: AnalysisRepository,
    pub signals: SignalRepository,
    pub gate: SignalGate,
    pub relay: Arc<SignalRelay>,
    pub ctx: Arc<WorkerContext>,
}

/// Build a harness around the given collaborator doubles.
pub async fn harness(
    config: AppConfig,
    extractor: Arc<dyn Extractor>,
    analyzer: Arc<dyn Analyzer>,
    ledger: Option<Arc<dyn Ledger>>,
) -> TestHarness {
    let db = setup_db().await;
    let config = Arc::new(config);

    let jobs = JobRepository::new(db.clone(), config.executor.lease_seconds);
    let records = RecordRepository::new(db.clone());
    let analyses = AnalysisRepository::new(db.clone());
    let signals = SignalRepository::new(db.clone());

    let relay = Arc::new(SignalRelay::new(
        config.oracle.clone(),
        signals.clone(),
        analyses.clone(),
        ledger,
    ));
    let gate = SignalGate::new(config.oracle.clone(), signals.clone(), jobs.clone());

    let ctx = Arc::new(WorkerContext {
        config: Arc::clone(&config),
        jobs: jobs.clone(),
        records: records.clone(),
        analyses: analyses.clone(),
        signals: signals.clone(),
        gate: gate.clone(),
        relay: Arc::clone(&relay),
        extractor,
        analyzer,
    });

    TestHarness {
        db,
        config,
        jobs,
        records,
        analyses,
        signals,
        gate,
        relay,
        ctx,
    }
}

/// Insert an analysis result with the given severity.
pub async fn seed_analysis(analyses: &AnalysisRepository, severity: Severity) -> AnalysisResult {
    analyses
        .insert(NewAnalysisResult {
            dataset_ref: Uuid::new_v4(),
            category: "trend".to_string(),
            metrics: serde_json::json!({
                "volume": 120,
                "velocity": 3.4,
                "acceleration": 0.8,
            }),
            quality_score: Some(0.92),
            severity,
        })
        .await
        .expect("insert analysis result")
}

/// A no-op extractor for tests that never run extraction jobs.
pub fn unused_extractor() -> Arc<dyn Extractor> {
    Arc::new(ScriptedExtractor::new(Vec::new()))
}

/// A no-op analyzer for tests that never run analysis jobs.
pub fn unused_analyzer() -> Arc<dyn Analyzer> {
    Arc::new(FixedAnalyzer::ok(Vec::new()))
}
