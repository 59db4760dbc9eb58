//! API Handlers
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use intake_core::{Context, RunReport, RunRequest, StageTrace, INTAKE_VERSION, UNKNOWN_TENANT};
use serde::Serialize;
use serde_json::json;

use crate::metrics::{OUTCOME_ERROR, OUTCOME_FAULT, OUTCOME_SUCCESS};
use crate::AppState;

pub const ENGINE_UNAVAILABLE_DETAIL: &str =
    "Workflow engine not available. Please check server logs.";

/// Body of a completed invocation, whether the run succeeded or ended in error.
#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub final_state: Context,
    pub diagnostic_log: Vec<String>,
    pub trace: Vec<StageTrace>,
    pub input_hash: String,
    pub pipeline_id: String,
}

impl From<RunReport> for WorkflowResponse {
    fn from(report: RunReport) -> Self {
        Self {
            diagnostic_log: report.diagnostic_log,
            final_state: report.final_context,
            trace: report.trace,
            input_hash: report.input_hash,
            pipeline_id: report.pipeline_id,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    EngineUnavailable,
    Invocation(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::EngineUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ENGINE_UNAVAILABLE_DETAIL.to_string(),
            ),
            ApiError::Invocation(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Workflow invocation error: {}", msg),
            ),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub async fn invoke_workflow(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let Some(engine) = state.engine.as_ref().map(Arc::clone) else {
        tracing::error!("workflow engine not initialized");
        state.metrics.record_unavailable();
        return Err(ApiError::EngineUnavailable);
    };

    let tenant = request
        .tenant_id
        .clone()
        .unwrap_or_else(|| UNKNOWN_TENANT.to_string());
    tracing::info!(tenant = %tenant, "invoking workflow");

    let started = Instant::now();
    let joined = tokio::task::spawn_blocking(move || engine.run(request)).await;
    let elapsed = started.elapsed().as_secs_f64();

    match joined {
        Ok(Ok(report)) => {
            let outcome = if report.is_successful() {
                OUTCOME_SUCCESS
            } else {
                OUTCOME_ERROR
            };
            state.metrics.record_run(outcome, elapsed);
            tracing::info!(
                tenant = %tenant,
                outcome,
                steps = report.trace.len(),
                "workflow completed"
            );
            Ok(Json(WorkflowResponse::from(report)))
        }
        Ok(Err(err)) => {
            state.metrics.record_run(OUTCOME_FAULT, elapsed);
            tracing::error!(tenant = %tenant, error = %err, "workflow invocation failed");
            Err(ApiError::Invocation(err.to_string()))
        }
        Err(err) => {
            state.metrics.record_run(OUTCOME_FAULT, elapsed);
            tracing::error!(tenant = %tenant, error = %err, "workflow task aborted");
            Err(ApiError::Invocation(err.to_string()))
        }
    }
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let ready = state.engine.is_some();
    let status = if ready { "ok" } else { "degraded" };
    (
        StatusCode::OK,
        Json(json!({
            "status": status,
            "version": INTAKE_VERSION,
            "engine_ready": ready
        })),
    )
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
