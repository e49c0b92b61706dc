use crate::errors::ServiceError;
use crate::models::PrintJobStatus;
use crate::services::print_jobs::JobDetail;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::str::FromStr;
use tracing::instrument;
use utoipa::IntoParams;
use uuid::Uuid;

const API_KEY_HEADER: &str = "X-API-Key";

pub fn print_job_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs))
        .route("/{id}", get(get_job))
        .route("/{id}/status", put(update_status))
        .route("/{id}/retry", post(retry_job))
}

/// The worker authenticates every call with a shared API key.
fn require_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), ServiceError> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized("missing API key".into()))?;
    if provided != state.config.worker_api_key {
        return Err(ServiceError::Unauthorized("invalid API key".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatusUpdateRequest {
    /// PRINTING, COMPLETED, or FAILED
    pub status: String,
    /// Failure detail, recorded on FAILED reports
    pub error_message: Option<String>,
}

fn parse_status(raw: &str) -> Result<PrintJobStatus, ServiceError> {
    PrintJobStatus::from_str(raw)
        .map_err(|_| ServiceError::BadRequest(format!("unknown print job status: {}", raw)))
}

#[utoipa::path(
    get,
    path = "/api/v1/print-jobs",
    tag = "print-jobs",
    params(("status" = Option<String>, Query, description = "Filter by status")),
    responses(
        (status = 200, description = "Jobs listed"),
        (status = 401, description = "Missing or invalid API key")
    )
)]
#[instrument(skip(state, headers))]
pub async fn list_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<crate::entities::print_job::Model>>, ServiceError> {
    require_api_key(&state, &headers)?;
    let status = params.status.as_deref().map(parse_status).transpose()?;
    let jobs = state.services.print_jobs.list(status).await?;
    Ok(Json(jobs))
}

#[utoipa::path(
    get,
    path = "/api/v1/print-jobs/{id}",
    tag = "print-jobs",
    params(("id" = Uuid, Path, description = "Print job id")),
    responses(
        (status = 200, description = "Job detail", body = JobDetail),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Job not found")
    )
)]
#[instrument(skip(state, headers))]
pub async fn get_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<JobDetail>, ServiceError> {
    require_api_key(&state, &headers)?;
    let detail = state.services.print_jobs.get_job_detail(id).await?;
    Ok(Json(detail))
}

#[utoipa::path(
    put,
    path = "/api/v1/print-jobs/{id}/status",
    tag = "print-jobs",
    params(
        ("id" = Uuid, Path, description = "Print job id"),
        StatusUpdateRequest
    ),
    responses(
        (status = 200, description = "Status applied"),
        (status = 400, description = "Transition not allowed"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Job not found")
    )
)]
#[instrument(skip(state, headers, params))]
pub async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<StatusUpdateRequest>,
) -> Result<Json<crate::entities::print_job::Model>, ServiceError> {
    require_api_key(&state, &headers)?;
    let status = parse_status(&params.status)?;
    let updated = state
        .services
        .print_jobs
        .update_status(id, status, params.error_message.as_deref())
        .await?;
    Ok(Json(updated))
}

#[utoipa::path(
    post,
    path = "/api/v1/print-jobs/{id}/retry",
    tag = "print-jobs",
    params(("id" = Uuid, Path, description = "Print job id")),
    responses(
        (status = 200, description = "Job re-queued"),
        (status = 400, description = "Job is not FAILED"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Job not found")
    )
)]
#[instrument(skip(state, headers))]
pub async fn retry_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<crate::entities::print_job::Model>, ServiceError> {
    require_api_key(&state, &headers)?;
    let updated = state.services.print_jobs.retry(id).await?;
    Ok(Json(updated))
}
