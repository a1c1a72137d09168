//! Recurring cron triggers, one per job id.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone};
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{
    Job as CronJob, JobBuilder, JobScheduler as TokioCronScheduler, JobSchedulerError,
};
use uuid::Uuid;

use crate::jobs::error::{JobError, JobResult};
use crate::jobs::executor::JobExecutor;
use crate::jobs::types::Trigger;
use crate::models::Job;

const CRON_FIELDS: usize = 5;

type Fire = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Convert a five-field cron expression into the seconds-first form the
/// underlying scheduler parses.
fn with_seconds(schedule: &str) -> JobResult<String> {
    let fields: Vec<&str> = schedule.split_whitespace().collect();
    if fields.len() != CRON_FIELDS {
        return Err(JobError::ScheduleParse {
            expression: schedule.to_string(),
            reason: format!("expected {CRON_FIELDS} fields, found {}", fields.len()),
        });
    }
    Ok(format!("0 {}", fields.join(" ")))
}

fn schedule_error(schedule: &str, error: JobSchedulerError) -> JobError {
    JobError::ScheduleParse {
        expression: schedule.to_string(),
        reason: format!("{error:?}"),
    }
}

/// Build a local-time trigger from a seconds-first expression.
///
/// Goes through [`JobBuilder`] so that a restricted day-of-month and a
/// restricted day-of-week match when either one does.
fn build_trigger<F>(expression: &str, fire: F) -> Result<CronJob, JobSchedulerError>
where
    F: Fn() -> Fire + Send + Sync + 'static,
{
    JobBuilder::new()
        .with_timezone(Local)
        .with_cron_job_type()
        .with_schedule(expression)?
        .with_run_async(Box::new(move |_uuid, _lock| fire()))
        .build()
}

fn next_tick(trigger: &mut CronJob) -> Option<DateTime<Local>> {
    let next = trigger.job_data().ok()?.next_tick;
    if next == 0 {
        return None;
    }
    Local.timestamp_opt(i64::try_from(next).ok()?, 0).single()
}

/// Next local instant `schedule` fires after now
pub fn next_firing(schedule: &str) -> JobResult<Option<DateTime<Local>>> {
    let expression = with_seconds(schedule)?;
    let mut trigger = build_trigger(&expression, || Box::pin(async {}))
        .map_err(|e| schedule_error(schedule, e))?;
    Ok(next_tick(&mut trigger))
}

/// Check that `schedule` is a valid five-field cron expression
pub fn validate_schedule(schedule: &str) -> JobResult<()> {
    next_firing(schedule).map(|_| ())
}

struct Registration {
    job: Job,
    /// Set while the trigger is installed in the running scheduler
    handle: Option<Uuid>,
}

#[derive(Default)]
struct Registry {
    started: bool,
    running: bool,
    triggers: HashMap<String, Registration>,
}

/// Owns the recurring triggers. Registrations survive [`CronEngine::stop`]
/// and are reinstalled by [`CronEngine::start`].
pub struct CronEngine {
    scheduler: Mutex<TokioCronScheduler>,
    executor: Arc<JobExecutor>,
    registry: RwLock<Registry>,
}

impl CronEngine {
    pub async fn new(executor: Arc<JobExecutor>) -> JobResult<Self> {
        let scheduler = TokioCronScheduler::new().await?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            executor,
            registry: RwLock::new(Registry::default()),
        })
    }

    fn trigger_for(&self, job: &Job) -> JobResult<CronJob> {
        let expression = with_seconds(&job.schedule)?;
        self.trigger_with(job, &expression)
            .map_err(|e| schedule_error(&job.schedule, e))
    }

    /// Trigger firing on `expression` that runs a snapshot of `job`
    fn trigger_with(&self, job: &Job, expression: &str) -> Result<CronJob, JobSchedulerError> {
        let executor = Arc::clone(&self.executor);
        let snapshot = job.clone();
        build_trigger(expression, move || {
            let executor = Arc::clone(&executor);
            let job = snapshot.clone();
            Box::pin(async move {
                executor.run_job(&job, Trigger::Cron).await;
            })
        })
    }

    async fn uninstall(&self, registration: &mut Registration) {
        if let Some(handle) = registration.handle.take() {
            if let Err(e) = self.scheduler.lock().await.remove(&handle).await {
                tracing::warn!(job_id = %registration.job.id, error = ?e, "Failed to remove cron trigger");
            }
        }
    }

    /// Install or replace the trigger for `job`.
    ///
    /// A disabled job only loses its previous trigger. An invalid schedule
    /// also leaves the job without any trigger.
    pub async fn register(&self, job: &Job) -> JobResult<()> {
        let mut registry = self.registry.write().await;

        if let Some(mut previous) = registry.triggers.remove(&job.id) {
            self.uninstall(&mut previous).await;
        }

        if !job.enabled {
            tracing::debug!(job_id = %job.id, "Job disabled, no trigger installed");
            return Ok(());
        }

        let mut trigger = self.trigger_for(job)?;
        let next_run = next_tick(&mut trigger);
        let handle = if registry.running {
            Some(self.scheduler.lock().await.add(trigger).await?)
        } else {
            None
        };

        registry.triggers.insert(
            job.id.clone(),
            Registration {
                job: job.clone(),
                handle,
            },
        );
        tracing::info!(
            job_id = %job.id,
            schedule = %job.schedule,
            active = handle.is_some(),
            next_run = ?next_run,
            "Registered cron trigger"
        );
        Ok(())
    }

    /// Remove the trigger for `job_id`; unknown ids are ignored
    pub async fn unregister(&self, job_id: &str) {
        let mut registry = self.registry.write().await;
        if let Some(mut registration) = registry.triggers.remove(job_id) {
            self.uninstall(&mut registration).await;
            tracing::info!(job_id = %job_id, "Unregistered cron trigger");
        }
    }

    /// Start honoring registered triggers
    pub async fn start(&self) -> JobResult<()> {
        let mut registry = self.registry.write().await;
        if registry.running {
            return Ok(());
        }

        let scheduler = self.scheduler.lock().await;
        if !registry.started {
            scheduler.start().await?;
            registry.started = true;
        }

        for registration in registry.triggers.values_mut() {
            match self.trigger_for(&registration.job) {
                Ok(trigger) => registration.handle = Some(scheduler.add(trigger).await?),
                Err(e) => {
                    tracing::error!(job_id = %registration.job.id, error = %e, "Failed to install cron trigger");
                }
            }
        }

        registry.running = true;
        tracing::info!(triggers = registry.triggers.len(), "Cron engine started");
        Ok(())
    }

    /// Stop firing; registrations are kept
    pub async fn stop(&self) {
        let mut registry = self.registry.write().await;
        for registration in registry.triggers.values_mut() {
            self.uninstall(registration).await;
        }
        registry.running = false;
        tracing::info!("Cron engine stopped");
    }

    /// Stop and tear down the underlying scheduler
    pub async fn shutdown(&self) -> JobResult<()> {
        self.stop().await;
        let mut registry = self.registry.write().await;
        if registry.started {
            self.scheduler.lock().await.shutdown().await?;
            registry.started = false;
        }
        Ok(())
    }

    pub async fn is_registered(&self, job_id: &str) -> bool {
        self.registry.read().await.triggers.contains_key(job_id)
    }

    /// Next firing of the installed trigger for `job_id`, as the running
    /// scheduler sees it
    pub async fn next_run(&self, job_id: &str) -> Option<DateTime<Local>> {
        let registry = self.registry.read().await;
        let handle = registry.triggers.get(job_id)?.handle?;
        let next = self
            .scheduler
            .lock()
            .await
            .next_tick_for_job(handle)
            .await
            .ok()
            .flatten()?;
        Some(next.with_timezone(&Local))
    }

    /// Number of triggers currently installed in the running scheduler
    pub async fn active_triggers(&self) -> usize {
        self.registry
            .read()
            .await
            .triggers
            .values()
            .filter(|registration| registration.handle.is_some())
            .count()
    }
}
