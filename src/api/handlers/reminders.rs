//! Reminder edits. Both operations rewrite the owning job and reschedule it.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::put,
};

use super::save_job;
use crate::api::extract::ValidatedJson;
use crate::error::{AppError, AppResult};
use crate::jobs::JobError;
use crate::models::Reminder;
use crate::state::AppState;

/// Routes nested under `/api/reminders`
pub fn reminder_routes() -> Router<AppState> {
    Router::new().route("/{job_id}/{reminder_id}", put(update_reminder).delete(delete_reminder))
}

/// PUT /api/reminders/{job_id}/{reminder_id}
async fn update_reminder(
    State(state): State<AppState>,
    Path((job_id, reminder_id)): Path<(String, String)>,
    ValidatedJson(reminder): ValidatedJson<Reminder>,
) -> AppResult<Json<Reminder>> {
    if reminder.id != reminder_id {
        return Err(AppError::bad_request(format!(
            "Reminder ID mismatch: path '{reminder_id}', body '{}'",
            reminder.id
        )));
    }

    let _guard = state.mutations.lock().await;
    let mut job = state.repository.get_job(&job_id).await?;
    let slot = job
        .reminder_mut(&reminder_id)
        .ok_or_else(|| JobError::reminder_not_found(&job_id, &reminder_id))?;
    *slot = reminder.clone();

    save_job(&state, job).await?;
    tracing::info!(job_id = %job_id, reminder_id = %reminder_id, "Reminder updated");
    Ok(Json(reminder))
}

/// DELETE /api/reminders/{job_id}/{reminder_id}
async fn delete_reminder(
    State(state): State<AppState>,
    Path((job_id, reminder_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let _guard = state.mutations.lock().await;
    let mut job = state.repository.get_job(&job_id).await?;
    let before = job.reminders.len();
    job.reminders.retain(|r| r.id != reminder_id);
    if job.reminders.len() == before {
        return Err(JobError::reminder_not_found(&job_id, &reminder_id).into());
    }

    save_job(&state, job).await?;
    tracing::info!(job_id = %job_id, reminder_id = %reminder_id, "Reminder deleted");
    Ok(StatusCode::NO_CONTENT)
}
