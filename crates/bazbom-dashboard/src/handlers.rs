//! Route handlers for the HTTP surface (C8, §4.8, §6).

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bazbom_core::{DepscanError, ScanOptions};
use bazbom_orchestrator::ReportOutcome;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub manifest_files: HashMap<String, String>,
    #[serde(default)]
    pub options: ScanOptions,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub job_id: String,
}

pub async fn start_scan(
    State(state): State<AppState>,
    Json(req): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, ApiError> {
    if req.manifest_files.len() > state.max_files_per_request {
        return Err(ApiError(DepscanError::Internal(format!(
            "too many files in request: max {}",
            state.max_files_per_request
        ))));
    }

    let (job_id, cancel) = state.registry.allocate().await?;
    let files: Vec<(String, String)> = req.manifest_files.into_iter().collect();
    tracing::info!(job_id = %job_id, file_count = files.len(), "scan requested");

    let registry = state.registry.clone();
    let orchestrator = state.orchestrator.clone();
    let running_job_id = job_id.clone();
    tokio::spawn(async move {
        orchestrator
            .run(&registry, &running_job_id, cancel, files, req.options)
            .await;
        tracing::info!(job_id = %running_job_id, "scan finished");
    });

    Ok(Json(ScanResponse { job_id }))
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let progress = state.registry.progress(&job_id).await?;
    Ok(Json(progress))
}

pub async fn get_report(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    match state.registry.report(&job_id).await {
        Ok(ReportOutcome::Ready(report)) => Json(report).into_response(),
        Ok(ReportOutcome::Pending(status)) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "not_ready", "status": status })),
        )
            .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

pub async fn cancel_scan(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.cancel(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health() -> &'static str {
    "ok"
}
