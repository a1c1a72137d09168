//! Application state for Axum web framework.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::jobs::Scheduler;
use crate::repositories::JobRepository;

/// Shared handles passed to every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub repository: Arc<dyn JobRepository>,
    /// Serializes read-modify-write sequences on stored jobs
    pub mutations: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(scheduler: Arc<Scheduler>, repository: Arc<dyn JobRepository>) -> Self {
        Self {
            scheduler,
            repository,
            mutations: Arc::new(Mutex::new(())),
        }
    }
}
