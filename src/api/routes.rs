//! Router configuration for the API.

use axum::{Router, middleware};
use tower_http::compression::CompressionLayer;

use crate::api::handlers;
use crate::api::middleware::{global_error_handler, logging_middleware, request_id_middleware};
use crate::state::AppState;

/// Build the application router.
///
/// Middleware runs outermost first: request id, then logging, then error
/// normalization. Responses are compressed when the client accepts it.
///
/// # Routes
/// - `/health`
/// - `/api/jobs`, `/api/jobs/{id}`, `/api/jobs/{id}/output`, `/api/jobs/test/{id}`
/// - `/api/reminders/{job_id}/{reminder_id}`
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .nest("/jobs", handlers::jobs::job_routes())
        .nest("/reminders", handlers::reminders::reminder_routes());

    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/api", api_routes)
        // Last added runs first
        .layer(middleware::from_fn(global_error_handler))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CompressionLayer::new())
        .with_state(state)
}
