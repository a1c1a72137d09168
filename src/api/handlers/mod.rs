//! HTTP request handlers for API endpoints.

pub mod health;
pub mod jobs;
pub mod reminders;

use std::collections::HashSet;

use crate::error::{AppError, AppResult};
use crate::jobs::validate_schedule;
use crate::models::Job;
use crate::state::AppState;

/// Check, store, persist and schedule `job`.
///
/// Nothing is written when the schedule does not parse or reminder ids
/// collide.
async fn save_job(state: &AppState, job: Job) -> AppResult<Job> {
    validate_schedule(&job.schedule)?;

    let mut seen = HashSet::new();
    if let Some(duplicate) = job.reminders.iter().find(|r| !seen.insert(r.id.as_str())) {
        return Err(AppError::Validation {
            field: "reminders".to_string(),
            reason: format!("duplicate reminder id '{}'", duplicate.id),
        });
    }

    state.repository.upsert_job(job.clone()).await?;
    state.repository.persist().await?;
    state.scheduler.add_or_update_job(&job).await?;
    Ok(job)
}
