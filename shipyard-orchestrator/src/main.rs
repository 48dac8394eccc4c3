use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod agent;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod kv;
pub mod repository;
pub mod service;

use agent::{AgentRegistry, HttpAgentRunner};
use config::Config;
use kv::{KvStore, MemoryKv, PgKv};
use repository::{
    ErrorLogRepository, GateRepository, KvHandle, PipelineRepository, SessionRepository,
};
use service::{
    ApprovalService, DispatchPolicy, ErrorLogService, Orchestrator, SessionService,
    StreamPublisher,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shipyard_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Shipyard Orchestrator...");

    let config = Config::from_env();
    config.validate().context("Invalid configuration")?;

    let store: Arc<dyn KvStore> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = db::create_pool(database_url, config.store_timeout)
                .await
                .context("Failed to create database pool")?;

            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            tracing::info!("Using PostgreSQL store");
            Arc::new(PgKv::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryKv::new())
        }
    };
    let kv = KvHandle::new(store, config.store_timeout);

    let runner = HttpAgentRunner::new(config.agent_base_url.clone(), config.stage_timeout)
        .context("Failed to build agent HTTP client")?;
    tracing::info!("Dispatching stages to {}", runner.base_url());
    let agents = AgentRegistry::uniform(Arc::new(runner));

    let pipelines = PipelineRepository::new(kv.clone());
    let error_log = ErrorLogService::new(ErrorLogRepository::new(kv.clone()));
    let sessions = SessionService::new(SessionRepository::new(kv.clone()));
    let approvals = ApprovalService::new(
        pipelines.clone(),
        GateRepository::new(kv),
        error_log.clone(),
    );
    let orchestrator = Orchestrator::new(
        pipelines.clone(),
        sessions.clone(),
        approvals,
        error_log,
        agents,
        DispatchPolicy::from(&config),
    );
    let streams = StreamPublisher::new(pipelines, config.poll_interval);

    // Build router with all API endpoints
    let app = api::create_router(api::AppState {
        sessions,
        orchestrator,
        streams,
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
