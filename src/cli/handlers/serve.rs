//! Serve command handler

use crate::config::{Environment, Settings};
use crate::error::{AppError, AppResult};
use crate::jobs::validate_schedule;
use crate::repositories::{FileJobRepository, JobRepository};
use crate::server::Server;

/// Outcome of a successful `--dry-run`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunReport {
    pub address: String,
    pub jobs: usize,
    pub reminders: usize,
}

pub struct ServeCommandHandler {
    config: Settings,
    environment: Environment,
}

impl ServeCommandHandler {
    pub fn new(config: Settings, environment: Environment) -> Self {
        Self {
            config,
            environment,
        }
    }

    pub async fn execute(self, dry_run: bool) -> AppResult<()> {
        if dry_run {
            let report = self.validate_only().await?;
            println!("✓ Configuration is valid");
            println!("✓ Server would bind to: {}", report.address);
            println!(
                "✓ Jobs file is valid: {} job(s), {} reminder(s)",
                report.jobs, report.reminders
            );
            println!("Dry run completed successfully");
            return Ok(());
        }

        Server::new(self.config, self.environment)
            .run()
            .await
            .map_err(AppError::from)
    }

    /// Validate settings and every job schedule without starting anything
    pub async fn validate_only(&self) -> AppResult<DryRunReport> {
        self.config.validate()?;

        let repository = FileJobRepository::load(self.config.scheduler.jobs_path()).await?;
        let jobs = repository.get_all_jobs().await;
        for job in &jobs {
            validate_schedule(&job.schedule).map_err(|e| AppError::Validation {
                field: format!("jobs[{}].schedule", job.id),
                reason: e.to_string(),
            })?;
        }

        Ok(DryRunReport {
            address: self.config.server.address(),
            jobs: jobs.len(),
            reminders: jobs.iter().map(|job| job.reminders.len()).sum(),
        })
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
