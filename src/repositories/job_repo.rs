use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::jobs::{JobError, JobResult};
use crate::models::Job;

/// Storage contract the scheduler core depends on
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn get_job(&self, id: &str) -> JobResult<Job>;

    /// Snapshot copy of every stored job, in insertion order
    async fn get_all_jobs(&self) -> Vec<Job>;

    /// Replace the job with the same id, or append it
    async fn upsert_job(&self, job: Job) -> JobResult<()>;

    async fn delete_job(&self, id: &str) -> JobResult<()>;

    async fn delete_reminder(&self, job_id: &str, reminder_id: &str) -> JobResult<()>;

    /// Durably save the current state
    async fn persist(&self) -> JobResult<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JobsDocument {
    #[serde(default)]
    jobs: Vec<Job>,
}

/// Jobs kept in memory and saved as a YAML `{ jobs: [...] }` document
#[derive(Debug, Clone)]
pub struct FileJobRepository {
    path: PathBuf,
    jobs: Arc<RwLock<Vec<Job>>>,
    write_lock: Arc<Mutex<()>>,
}

impl FileJobRepository {
    /// Repository with no jobs that will persist to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            jobs: Arc::new(RwLock::new(Vec::new())),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Load `path`; a missing file yields an empty repository
    pub async fn load(path: impl Into<PathBuf>) -> JobResult<Self> {
        let repository = Self::new(path);

        let content = match tokio::fs::read_to_string(&repository.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %repository.path.display(), "Jobs file not found, starting empty");
                return Ok(repository);
            }
            Err(e) => {
                return Err(JobError::Persistence(format!(
                    "failed to read {}: {e}",
                    repository.path.display()
                )));
            }
        };

        let document: JobsDocument = if content.trim().is_empty() {
            JobsDocument::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                JobError::Persistence(format!("failed to parse {}: {e}", repository.path.display()))
            })?
        };

        tracing::info!(
            path = %repository.path.display(),
            jobs = document.jobs.len(),
            "Loaded jobs file"
        );
        *repository.write()? = document.jobs;
        Ok(repository)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop every reminder due at or before `now`, returning how many were removed
    pub fn prune_past_reminders(&self, now: DateTime<FixedOffset>) -> JobResult<usize> {
        let mut jobs = self.write()?;
        let mut pruned = 0;
        for job in jobs.iter_mut() {
            let before = job.reminders.len();
            job.reminders.retain(|reminder| reminder.datetime > now);
            let removed = before - job.reminders.len();
            if removed > 0 {
                tracing::info!(job_id = %job.id, removed, "Pruned past reminders");
            }
            pruned += removed;
        }
        Ok(pruned)
    }

    fn read(&self) -> JobResult<RwLockReadGuard<'_, Vec<Job>>> {
        self.jobs
            .read()
            .map_err(|_| JobError::Persistence("job store lock poisoned".to_string()))
    }

    fn write(&self) -> JobResult<RwLockWriteGuard<'_, Vec<Job>>> {
        self.jobs
            .write()
            .map_err(|_| JobError::Persistence("job store lock poisoned".to_string()))
    }
}

#[async_trait]
impl JobRepository for FileJobRepository {
    async fn get_job(&self, id: &str) -> JobResult<Job> {
        self.read()?
            .iter()
            .find(|job| job.id == id)
            .cloned()
            .ok_or_else(|| JobError::job_not_found(id))
    }

    async fn get_all_jobs(&self) -> Vec<Job> {
        match self.read() {
            Ok(jobs) => jobs.clone(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read jobs");
                Vec::new()
            }
        }
    }

    async fn upsert_job(&self, job: Job) -> JobResult<()> {
        let mut jobs = self.write()?;
        match jobs.iter_mut().find(|existing| existing.id == job.id) {
            Some(existing) => *existing = job,
            None => jobs.push(job),
        }
        Ok(())
    }

    async fn delete_job(&self, id: &str) -> JobResult<()> {
        let mut jobs = self.write()?;
        let position = jobs
            .iter()
            .position(|job| job.id == id)
            .ok_or_else(|| JobError::job_not_found(id))?;
        jobs.remove(position);
        Ok(())
    }

    async fn delete_reminder(&self, job_id: &str, reminder_id: &str) -> JobResult<()> {
        let mut jobs = self.write()?;
        let job = jobs
            .iter_mut()
            .find(|job| job.id == job_id)
            .ok_or_else(|| JobError::job_not_found(job_id))?;
        let position = job
            .reminders
            .iter()
            .position(|reminder| reminder.id == reminder_id)
            .ok_or_else(|| JobError::reminder_not_found(job_id, reminder_id))?;
        job.reminders.remove(position);
        Ok(())
    }

    async fn persist(&self) -> JobResult<()> {
        // Serialize and write under one lock so saves land in order
        let _guard = self.write_lock.lock().await;

        let yaml = {
            let jobs = self.read()?;
            serde_yaml::to_string(&JobsDocument { jobs: jobs.clone() })
                .map_err(|e| JobError::Persistence(format!("failed to serialize jobs: {e}")))?
        };

        tokio::fs::write(&self.path, yaml).await.map_err(|e| {
            JobError::Persistence(format!("failed to write {}: {e}", self.path.display()))
        })?;

        tracing::debug!(path = %self.path.display(), "Persisted jobs file");
        Ok(())
    }
}
