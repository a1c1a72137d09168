//! Job management request handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use super::save_job;
use crate::api::dto::JobOutputResponse;
use crate::api::extract::ValidatedJson;
use crate::error::{AppError, AppResult};
use crate::models::Job;
use crate::state::AppState;

/// Routes nested under `/api/jobs`
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/{id}", get(get_job).put(update_job).delete(delete_job))
        .route("/{id}/output", get(get_job_output))
        .route("/test/{id}", post(test_job))
}

/// GET /api/jobs
async fn list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.repository.get_all_jobs().await)
}

/// POST /api/jobs - create or replace by id
async fn create_job(
    State(state): State<AppState>,
    ValidatedJson(job): ValidatedJson<Job>,
) -> AppResult<(StatusCode, Json<Job>)> {
    let _guard = state.mutations.lock().await;
    let job = save_job(&state, job).await?;
    tracing::info!(job_id = %job.id, "Job saved");
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/jobs/{id}
async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Job>> {
    Ok(Json(state.repository.get_job(&id).await?))
}

/// PUT /api/jobs/{id}
async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(job): ValidatedJson<Job>,
) -> AppResult<Json<Job>> {
    if job.id != id {
        return Err(AppError::bad_request(format!(
            "Job ID mismatch: path '{id}', body '{}'",
            job.id
        )));
    }

    let _guard = state.mutations.lock().await;
    let job = save_job(&state, job).await?;
    tracing::info!(job_id = %job.id, "Job updated");
    Ok(Json(job))
}

/// DELETE /api/jobs/{id}
async fn delete_job(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<StatusCode> {
    let _guard = state.mutations.lock().await;
    state.repository.delete_job(&id).await?;
    state.repository.persist().await?;
    state.scheduler.remove_job(&id).await?;
    tracing::info!(job_id = %id, "Job deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/jobs/test/{id} - run once now, in the background
async fn test_job(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<StatusCode> {
    state.scheduler.test_job(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/jobs/{id}/output - last cached primary response
async fn get_job_output(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<JobOutputResponse>> {
    match state.scheduler.cached_output(&id).await {
        Some(output) => Ok(Json(JobOutputResponse { job_id: id, output })),
        None => Err(AppError::NotFound {
            entity: "Output".to_string(),
            id,
        }),
    }
}
