//! # Server Configuration
//!
//! Router and state for the operator HTTP surface, plus the top-level
//! `run_server` that wires the pool, migrations, background workers, the
//! relay monitor, and graceful shutdown together.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use migration::{Migrator, MigratorTrait};

use crate::auth::auth_middleware;
use crate::collaborators::{HttpExtractor, VolumeAnalyzer};
use crate::config::AppConfig;
use crate::db;
use crate::domain::JobKind;
use crate::gate::SignalGate;
use crate::handlers;
use crate::oracle::{Credential, JsonRpcLedger, Ledger, RelayMonitor, SignalRelay};
use crate::repositories::{
    AnalysisRepository, JobRepository, RecordRepository, SignalRepository,
};
use crate::workers::{JobExecutor, WorkerContext};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn job_repository(&self) -> JobRepository {
        JobRepository::new(self.db.clone(), self.config.executor.lease_seconds)
    }

    pub fn signal_repository(&self) -> SignalRepository {
        SignalRepository::new(self.db.clone())
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/jobs", post(handlers::jobs::submit_job))
        .route("/jobs", get(handlers::jobs::list_jobs))
        .route("/jobs/stats", get(handlers::jobs::job_stats))
        .route("/jobs/cleanup", post(handlers::jobs::cleanup_jobs))
        .route("/jobs/{id}", get(handlers::jobs::get_job))
        .route("/signals", get(handlers::signals::list_signals))
        .route("/signals/{id}", get(handlers::signals::get_signal))
        .route("/signals/{id}/retry", post(handlers::signals::retry_signal))
        .route("/oracle/status", get(handlers::oracle::oracle_status))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server and all background services with the given configuration
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::init_pool(&config).await?;
    Migrator::up(&db, None).await?;

    let config = Arc::new(config);

    let jobs = JobRepository::new(db.clone(), config.executor.lease_seconds);
    let records = RecordRepository::new(db.clone());
    let analyses = AnalysisRepository::new(db.clone());
    let signals = SignalRepository::new(db.clone());

    let ledger: Option<Arc<dyn Ledger>> = if config.oracle.enabled {
        let credential =
            Credential::from_hex(config.oracle.credential.as_deref().unwrap_or_default())?;
        let endpoint = config
            .oracle
            .endpoint
            .clone()
            .expect("validated by config loader");
        info!(
            endpoint = %endpoint,
            fingerprint = %credential.fingerprint(),
            "Ledger relay enabled"
        );
        Some(Arc::new(JsonRpcLedger::new(
            endpoint,
            credential,
            Duration::from_millis(config.oracle.receipt_poll_ms),
        )))
    } else {
        info!("Ledger relay disabled; signals will be created but not transmitted");
        None
    };

    let relay = Arc::new(SignalRelay::new(
        config.oracle.clone(),
        signals.clone(),
        analyses.clone(),
        ledger,
    ));
    let gate = SignalGate::new(config.oracle.clone(), signals.clone(), jobs.clone());

    let ctx = Arc::new(WorkerContext {
        config: Arc::clone(&config),
        jobs,
        records,
        analyses,
        signals: signals.clone(),
        gate,
        relay: Arc::clone(&relay),
        extractor: Arc::new(HttpExtractor::new(Duration::from_secs(30))),
        analyzer: Arc::new(VolumeAnalyzer::default()),
    });

    let shutdown = CancellationToken::new();

    // One executor pool per dispatch queue.
    for kind in JobKind::ALL {
        let executor = JobExecutor::new(kind, Arc::clone(&ctx));
        tokio::spawn(executor.run(shutdown.clone()));
    }

    // The monitor is independent of the queues: its sweep gives stuck
    // pending signals a second chance.
    let monitor = RelayMonitor::new(
        config.monitor.clone(),
        config.oracle.clone(),
        signals,
        relay,
    );
    tokio::spawn(monitor.run(shutdown.clone()));

    let state = AppState {
        db,
        config: Arc::clone(&config),
    };
    let app = create_app(state);

    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, profile = %config.profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::jobs::submit_job,
        crate::handlers::jobs::get_job,
        crate::handlers::jobs::list_jobs,
        crate::handlers::jobs::job_stats,
        crate::handlers::jobs::cleanup_jobs,
        crate::handlers::signals::list_signals,
        crate::handlers::signals::get_signal,
        crate::handlers::signals::retry_signal,
        crate::handlers::oracle::oracle_status,
    ),
    components(
        schemas(
            crate::handlers::ServiceInfo,
            crate::handlers::HealthResponse,
            crate::handlers::jobs::SubmitJobRequest,
            crate::handlers::jobs::SubmitJobResponse,
            crate::handlers::jobs::JobInfo,
            crate::handlers::jobs::JobsResponse,
            crate::handlers::jobs::CleanupResponse,
            crate::handlers::signals::SignalInfo,
            crate::handlers::signals::SignalsResponse,
            crate::handlers::signals::RetrySignalResponse,
            crate::handlers::oracle::OracleStatusResponse,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Watchtower Pipeline API",
        description = "Job orchestration and ledger signal relay",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}
