//! One-shot reminder timers keyed by (job id, reminder id).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::jobs::executor::JobExecutor;
use crate::models::{Job, Reminder};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReminderKey {
    pub job_id: String,
    pub reminder_id: String,
}

impl ReminderKey {
    pub fn new(job_id: &str, reminder_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            reminder_id: reminder_id.to_string(),
        }
    }
}

impl std::fmt::Display for ReminderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.job_id, self.reminder_id)
    }
}

struct Timer {
    generation: u64,
    cancel: CancellationToken,
}

struct Entry {
    job: Job,
    reminder: Reminder,
    /// Armed timer; `None` while the manager is stopped
    timer: Option<Timer>,
}

impl Entry {
    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel.cancel();
        }
    }
}

#[derive(Default)]
struct Registry {
    running: bool,
    next_generation: u64,
    entries: HashMap<ReminderKey, Entry>,
}

/// Time left before `reminder` is due, `None` once it is due
fn time_until(reminder: &Reminder) -> Option<Duration> {
    let remaining = reminder.datetime.signed_duration_since(Local::now());
    remaining.to_std().ok().filter(|remaining| !remaining.is_zero())
}

pub struct ReminderManager {
    executor: Arc<JobExecutor>,
    registry: Arc<RwLock<Registry>>,
}

impl ReminderManager {
    pub fn new(executor: Arc<JobExecutor>) -> Self {
        Self {
            executor,
            registry: Arc::new(RwLock::new(Registry::default())),
        }
    }

    /// Arm a timer for `reminder`, replacing any timer under the same key.
    ///
    /// Returns `false` when the reminder is already due; nothing is installed
    /// and the reminder stays in the repository.
    pub async fn schedule(&self, job: &Job, reminder: &Reminder) -> bool {
        let key = ReminderKey::new(&job.id, &reminder.id);
        let mut registry = self.registry.write().await;

        if let Some(mut previous) = registry.entries.remove(&key) {
            previous.disarm();
        }

        let Some(delay) = time_until(reminder) else {
            tracing::info!(job_id = %job.id, reminder_id = %reminder.id, datetime = %reminder.datetime, "Reminder is in the past, skipping");
            return false;
        };

        let timer = if registry.running {
            Some(self.arm(&mut registry, key.clone(), job, reminder, delay))
        } else {
            None
        };
        registry.entries.insert(
            key,
            Entry {
                job: job.clone(),
                reminder: reminder.clone(),
                timer,
            },
        );

        tracing::info!(
            job_id = %job.id,
            reminder_id = %reminder.id,
            delay_secs = delay.as_secs(),
            "Scheduled reminder"
        );
        true
    }

    fn arm(
        &self,
        registry: &mut Registry,
        key: ReminderKey,
        job: &Job,
        reminder: &Reminder,
        delay: Duration,
    ) -> Timer {
        let generation = registry.next_generation;
        registry.next_generation += 1;

        let cancel = CancellationToken::new();
        let cancelled = cancel.clone();
        let shared = Arc::clone(&self.registry);
        let executor = Arc::clone(&self.executor);
        let job = job.clone();
        let reminder = reminder.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    tracing::debug!(reminder = %key, "Reminder timer cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            // Claim the entry; a replacement or cancellation wins over this timer
            {
                let mut registry = shared.write().await;
                let owned = registry
                    .entries
                    .get(&key)
                    .and_then(|entry| entry.timer.as_ref())
                    .is_some_and(|timer| timer.generation == generation && !timer.cancel.is_cancelled());
                if !owned {
                    return;
                }
                registry.entries.remove(&key);
            }

            executor.run_reminder(&job, &reminder).await;
        });

        Timer { generation, cancel }
    }

    /// Cancel one reminder's timer; unknown keys are ignored
    pub async fn cancel(&self, job_id: &str, reminder_id: &str) {
        let key = ReminderKey::new(job_id, reminder_id);
        if let Some(mut entry) = self.registry.write().await.entries.remove(&key) {
            entry.disarm();
            tracing::info!(reminder = %key, "Cancelled reminder");
        }
    }

    /// Cancel every reminder timer of `job_id`
    pub async fn cancel_all(&self, job_id: &str) {
        let mut registry = self.registry.write().await;
        let mut cancelled = 0usize;
        registry.entries.retain(|key, entry| {
            if key.job_id == job_id {
                entry.disarm();
                cancelled += 1;
                false
            } else {
                true
            }
        });
        if cancelled > 0 {
            tracing::info!(job_id = %job_id, cancelled, "Cancelled reminders");
        }
    }

    /// Arm every pending reminder; ones that fell due while stopped are dropped
    pub async fn start(&self) {
        let mut registry = self.registry.write().await;
        if registry.running {
            return;
        }
        registry.running = true;

        let keys: Vec<ReminderKey> = registry.entries.keys().cloned().collect();
        for key in keys {
            let Some(entry) = registry.entries.get(&key) else {
                continue;
            };
            let (job, reminder) = (entry.job.clone(), entry.reminder.clone());

            match time_until(&reminder) {
                Some(delay) => {
                    let timer = self.arm(&mut registry, key.clone(), &job, &reminder, delay);
                    if let Some(entry) = registry.entries.get_mut(&key) {
                        entry.timer = Some(timer);
                    }
                }
                None => {
                    registry.entries.remove(&key);
                    tracing::info!(reminder = %key, "Reminder fell due while stopped, skipping");
                }
            }
        }

        tracing::info!(pending = registry.entries.len(), "Reminder manager started");
    }

    /// Disarm every timer, keeping the reminders registered
    pub async fn stop(&self) {
        let mut registry = self.registry.write().await;
        registry.running = false;
        registry.entries.values_mut().for_each(Entry::disarm);
        tracing::info!("Reminder manager stopped");
    }

    pub async fn is_pending(&self, job_id: &str, reminder_id: &str) -> bool {
        self.registry
            .read()
            .await
            .entries
            .contains_key(&ReminderKey::new(job_id, reminder_id))
    }

    /// Number of timers currently armed
    pub async fn armed(&self) -> usize {
        self.registry
            .read()
            .await
            .entries
            .values()
            .filter(|entry| entry.timer.is_some())
            .count()
    }
}
