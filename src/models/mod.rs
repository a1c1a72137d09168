mod job;

pub use job::{HttpMethod, Job, Reminder, WebhookConfig};
