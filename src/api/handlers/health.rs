//! Health check endpoint.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::dto::HealthResponse;
use crate::state::AppState;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::pkg_version().to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        jobs: state.repository.get_all_jobs().await.len(),
    })
}
