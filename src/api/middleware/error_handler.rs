//! Conversion of [`AppError`] into HTTP responses.
//!
//! Handlers return `AppResult<T>`; the error side becomes a JSON
//! [`ErrorResponse`]. [`global_error_handler`] gives framework-generated
//! errors (unknown route, wrong method) the same shape and stamps the
//! request id onto every error body.

use axum::{
    Json,
    extract::{
        Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::api::dto::ErrorResponse;
use crate::api::middleware::RequestId;
use crate::error::AppError;

/// Upper bound on error bodies re-read by [`global_error_handler`]
const MAX_ERROR_BODY: usize = 64 * 1024;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::ValidationErrors { .. } => StatusCode::BAD_REQUEST,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Scheduling { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::ValidationErrors { .. } => "VALIDATION_ERROR",
            AppError::BadRequest { .. } => "BAD_REQUEST",
            AppError::Scheduling { .. } => "SCHEDULING_ERROR",
            AppError::Persistence { .. } => "PERSISTENCE_ERROR",
            AppError::Configuration { .. } => "CONFIGURATION_ERROR",
            AppError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    fn to_error_response(&self) -> ErrorResponse {
        let response = ErrorResponse::new(self.code(), self.to_string());
        match self {
            AppError::Validation { field, reason } => response.with_details(json!({
                "field": field,
                "reason": reason,
            })),
            AppError::ValidationErrors { errors } => response.with_details(json!(errors)),
            AppError::Configuration { key, .. } => response.with_details(json!({ "key": key })),
            // Internal details stay in the log
            AppError::Internal { .. } => ErrorResponse::new(self.code(), "An internal error occurred"),
            _ => response,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        (status, Json(self.to_error_response())).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

fn default_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "BAD_REQUEST",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::METHOD_NOT_ALLOWED => "METHOD_NOT_ALLOWED",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_MEDIA_TYPE",
        StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
        StatusCode::UNPROCESSABLE_ENTITY => "UNPROCESSABLE_CONTENT",
        s if s.is_server_error() => "INTERNAL_ERROR",
        _ => "UNKNOWN_ERROR",
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Normalize every 4xx/5xx response to an [`ErrorResponse`] carrying the
/// request id.
pub async fn global_error_handler(request: Request, next: Next) -> Response {
    let request_id = request.extensions().get::<RequestId>().map(|id| id.0.clone());
    let response = next.run(request).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let json = is_json(&response);
    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_ERROR_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => axum::body::Bytes::new(),
    };

    let mut error_response = match serde_json::from_slice::<ErrorResponse>(&bytes) {
        Ok(parsed) if json => parsed,
        _ => {
            let original = String::from_utf8_lossy(&bytes).trim().to_string();
            let message = if original.is_empty() {
                status.canonical_reason().unwrap_or("Request failed").to_string()
            } else {
                original
            };
            ErrorResponse::new(default_code(status), message)
        }
    };

    if let Some(ref id) = request_id {
        error_response = error_response.with_request_id(id);
    }

    let mut rebuilt = (status, Json(error_response)).into_response();
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            rebuilt.headers_mut().insert(name.clone(), value.clone());
        }
    }
    rebuilt
}
