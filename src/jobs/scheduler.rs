use std::sync::Arc;
use std::time::Duration;

use crate::jobs::cache::OutputCache;
use crate::jobs::cron::CronEngine;
use crate::jobs::error::JobResult;
use crate::jobs::executor::{ExecutionLimiter, JobExecutor};
use crate::jobs::reminders::ReminderManager;
use crate::jobs::types::Trigger;
use crate::jobs::webhook::{DEFAULT_TIMEOUT, WebhookExecutor};
use crate::models::Job;
use crate::repositories::JobRepository;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// Timeout for webhooks that do not set one
    pub default_timeout: Duration,
    /// 0 means unbounded
    pub max_concurrent_executions: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            max_concurrent_executions: 0,
        }
    }
}

/// Coordinates the cron engine, reminder timers and output cache
pub struct Scheduler {
    repository: Arc<dyn JobRepository>,
    executor: Arc<JobExecutor>,
    cron: CronEngine,
    reminders: ReminderManager,
    cache: OutputCache,
}

impl Scheduler {
    pub async fn new(repository: Arc<dyn JobRepository>, options: SchedulerOptions) -> JobResult<Self> {
        let cache = OutputCache::new();
        let executor = Arc::new(JobExecutor::new(
            WebhookExecutor::new(options.default_timeout)?,
            cache.clone(),
            Arc::clone(&repository),
            ExecutionLimiter::new(options.max_concurrent_executions),
        ));

        Ok(Self {
            cron: CronEngine::new(Arc::clone(&executor)).await?,
            reminders: ReminderManager::new(Arc::clone(&executor)),
            repository,
            executor,
            cache,
        })
    }

    /// Install or replace the trigger and reminder timers for `job`.
    ///
    /// Fails with [`JobError::ScheduleParse`](crate::jobs::JobError::ScheduleParse)
    /// when the schedule is invalid; the job is then left unscheduled.
    pub async fn add_or_update_job(&self, job: &Job) -> JobResult<()> {
        self.reminders.cancel_all(&job.id).await;
        self.cron.register(job).await?;

        if job.enabled {
            for reminder in &job.reminders {
                self.reminders.schedule(job, reminder).await;
            }
        }

        tracing::info!(job_id = %job.id, enabled = job.enabled, reminders = job.reminders.len(), "Job scheduled");
        Ok(())
    }

    /// Cancel the trigger and timers of `job_id` and drop its cached output
    pub async fn remove_job(&self, job_id: &str) -> JobResult<()> {
        self.cron.unregister(job_id).await;
        self.reminders.cancel_all(job_id).await;
        self.cache.remove(job_id).await;
        tracing::info!(job_id = %job_id, "Job removed from scheduler");
        Ok(())
    }

    /// Run the job now in the background; returns once the run is spawned
    pub async fn test_job(&self, job_id: &str) -> JobResult<()> {
        let job = self.repository.get_job(job_id).await?;
        let executor = Arc::clone(&self.executor);

        tracing::info!(job_id = %job_id, "Manual job run requested");
        tokio::spawn(async move {
            executor.run_job(&job, Trigger::Manual).await;
        });
        Ok(())
    }

    /// Register every stored job; failures are logged and skipped
    pub async fn load_jobs(&self) -> usize {
        let jobs = self.repository.get_all_jobs().await;
        let mut loaded = 0;
        for job in &jobs {
            match self.add_or_update_job(job).await {
                Ok(()) => loaded += 1,
                Err(e) => tracing::error!(job_id = %job.id, error = %e, "Failed to load job"),
            }
        }
        tracing::info!(loaded, total = jobs.len(), "Loaded jobs");
        loaded
    }

    pub async fn start(&self) -> JobResult<()> {
        self.cron.start().await?;
        self.reminders.start().await;
        tracing::info!("Scheduler started");
        Ok(())
    }

    /// Halt all firing; registrations are kept for the next [`Scheduler::start`]
    pub async fn stop(&self) {
        self.cron.stop().await;
        self.reminders.stop().await;
        tracing::info!("Scheduler stopped");
    }

    /// Stop firing and release the cron runtime
    pub async fn shutdown(&self) -> JobResult<()> {
        self.reminders.stop().await;
        self.cron.shutdown().await
    }

    pub async fn cached_output(&self, job_id: &str) -> Option<String> {
        self.cache.get(job_id).await
    }

    pub async fn has_trigger(&self, job_id: &str) -> bool {
        self.cron.is_registered(job_id).await
    }

    pub async fn has_pending_reminder(&self, job_id: &str, reminder_id: &str) -> bool {
        self.reminders.is_pending(job_id, reminder_id).await
    }
}
