use serde::Serialize;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::config::ConfigError;
use crate::jobs::JobError;

/// One failed field of a validated request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFieldError {
    /// Dotted path, e.g. `primary.url`
    pub field: String,
    pub message: String,
}

/// Error type of the API and CLI layers.
///
/// Core [`JobError`]s are folded into the variant whose HTTP status fits.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Validation failed for {} field(s)", errors.len())]
    ValidationErrors { errors: Vec<ValidationFieldError> },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// The scheduler runtime refused an operation
    #[error("Scheduling failed: {message}")]
    Scheduling { message: String },

    #[error("Persistence failed: {message}")]
    Persistence { message: String },

    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<JobError> for AppError {
    fn from(error: JobError) -> Self {
        match error {
            JobError::NotFound { entity, id } => AppError::NotFound {
                entity: entity.to_string(),
                id,
            },
            JobError::ScheduleParse { expression, reason } => AppError::Validation {
                field: "schedule".to_string(),
                reason: format!("invalid cron expression '{expression}': {reason}"),
            },
            JobError::InvalidRequest(message) => AppError::BadRequest { message },
            JobError::Persistence(message) => AppError::Persistence { message },
            JobError::Scheduler(message) => AppError::Scheduling { message },
            other => AppError::Internal {
                source: anyhow::Error::new(other),
            },
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        let key = match &error {
            ConfigError::ValidationError { field, .. } => field.clone(),
            ConfigError::FileNotFound(_) => "config_file".to_string(),
            ConfigError::MutualExclusivityError(_) => "config_source".to_string(),
            _ => "configuration".to_string(),
        };
        AppError::Configuration {
            key,
            source: anyhow::Error::new(error),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = Vec::new();
        flatten_validation_errors(&errors, "", &mut fields);
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::ValidationErrors { errors: fields }
    }
}

fn flatten_validation_errors(
    errors: &ValidationErrors,
    prefix: &str,
    out: &mut Vec<ValidationFieldError>,
) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                out.extend(field_errors.iter().map(|error| ValidationFieldError {
                    field: path.clone(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string()),
                }));
            }
            ValidationErrorsKind::Struct(nested) => flatten_validation_errors(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten_validation_errors(nested, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
