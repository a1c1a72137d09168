//! Scheduling and webhook-chaining engine.

pub mod cache;
pub mod cron;
pub mod error;
pub mod executor;
pub mod extract;
pub mod reminders;
pub mod scheduler;
pub mod template;
pub mod types;
pub mod webhook;

pub use cache::OutputCache;
pub use cron::{CronEngine, validate_schedule};
pub use error::{JobError, JobResult};
pub use executor::{ExecutionLimiter, JobExecutor};
pub use reminders::{ReminderKey, ReminderManager};
pub use scheduler::{Scheduler, SchedulerOptions};
pub use types::{Trigger, VarValue, Variables};
pub use webhook::WebhookExecutor;
