//! Intake API: HTTP boundary for the intake workflow.
//!
//! | Route | Method | Purpose |
//! |-------|--------|---------|
//! | `/invoke_workflow` | POST | Run one workflow and return its final state |
//! | `/v1/health` | GET | Liveness and engine readiness |
//! | `/metrics` | GET | Prometheus exposition |
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;

use std::sync::Arc;

use anyhow::Context as _;
use axum::{
    routing::{get, post},
    Router,
};
use intake_core::{EngineError, PipelineEngine};
use tower_http::trace::TraceLayer;

pub use config::ServiceConfig;
use metrics::Metrics;

/// Shared handler state. `engine` is `None` when construction failed at startup.
#[derive(Clone)]
pub struct AppState {
    pub engine: Option<Arc<PipelineEngine>>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Keeps serving when the engine could not be built; invocations then get 503.
    pub fn new(engine: Result<PipelineEngine, EngineError>) -> Result<Self, prometheus::Error> {
        let engine = match engine {
            Ok(engine) => {
                tracing::info!(pipeline = %engine.pipeline_id(), "workflow engine ready");
                Some(Arc::new(engine))
            }
            Err(err) => {
                tracing::error!(error = %err, "workflow engine failed to initialize");
                None
            }
        };
        Ok(Self {
            engine,
            metrics: Arc::new(Metrics::new()?),
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/invoke_workflow", post(handlers::invoke_workflow))
        .route("/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(middleware::cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    let engine = config
        .load_pipeline_config()
        .map_err(EngineError::from)
        .and_then(intake_stages::default_engine);
    let state = AppState::new(engine)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    tracing::info!("Intake API listening on {}", config.addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
