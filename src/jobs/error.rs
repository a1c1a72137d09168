use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    ScheduleParse { expression: String, reason: String },

    #[error("Webhook transport error: {0}")]
    WebhookTransport(#[from] reqwest::Error),

    #[error("Webhook returned error status {status}: {body}")]
    WebhookStatus { status: u16, body: String },

    #[error("Failed to parse JSON response: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to parse jq selector '{selector}': {reason}")]
    JqParse { selector: String, reason: String },

    #[error("Failed to evaluate jq selector '{selector}': {reason}")]
    JqEval { selector: String, reason: String },

    #[error("Failed to marshal template value for '{name}': {reason}")]
    TemplateMarshal { name: String, reason: String },

    #[error("Failed to persist job repository: {0}")]
    Persistence(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid webhook request: {0}")]
    InvalidRequest(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl JobError {
    pub fn job_not_found(id: impl Into<String>) -> Self {
        JobError::NotFound {
            entity: "Job",
            id: id.into(),
        }
    }

    pub fn reminder_not_found(job_id: &str, reminder_id: &str) -> Self {
        JobError::NotFound {
            entity: "Reminder",
            id: format!("{job_id}/{reminder_id}"),
        }
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for JobError {
    fn from(error: tokio_cron_scheduler::JobSchedulerError) -> Self {
        JobError::Scheduler(format!("{error:?}"))
    }
}

pub type JobResult<T> = Result<T, JobError>;
