//! HTTP server lifecycle: repository loading, scheduler startup, serving
//! and graceful shutdown.

use std::sync::Arc;

use chrono::Local;
use tokio::net::TcpListener;
use tokio::signal;

use crate::api::create_router;
use crate::config::{Environment, Settings};
use crate::jobs::Scheduler;
use crate::repositories::{FileJobRepository, JobRepository};
use crate::state::AppState;

pub struct Server {
    settings: Settings,
    environment: Environment,
}

impl Server {
    pub fn new(settings: Settings, environment: Environment) -> Self {
        Self {
            settings,
            environment,
        }
    }

    /// Run until Ctrl+C or SIGTERM.
    ///
    /// Past-due reminders are pruned from the jobs file before any job is
    /// registered.
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!(
            version = %crate::pkg_version(),
            environment = %self.environment,
            "hookcron starting"
        );
        tracing::info!(
            jobs_file = %self.settings.scheduler.jobs_file,
            default_timeout_seconds = self.settings.scheduler.default_timeout_seconds,
            max_concurrent_executions = self.settings.scheduler.max_concurrent_executions,
            "Scheduler configuration loaded"
        );

        let repository = Arc::new(FileJobRepository::load(self.settings.scheduler.jobs_path()).await?);
        let pruned = repository.prune_past_reminders(Local::now().fixed_offset())?;
        if pruned > 0 {
            tracing::info!(pruned, "Removed past reminders");
            if let Err(e) = repository.persist().await {
                tracing::warn!(error = %e, "Failed to save pruned jobs file");
            }
        }

        let scheduler = Arc::new(Scheduler::new(repository.clone(), self.settings.scheduler.options()).await?);
        scheduler.load_jobs().await;
        scheduler.start().await?;

        let router = create_router(AppState::new(scheduler.clone(), repository));

        let address = self.settings.server.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!(error = %e, address = %address, "Failed to bind to address");
            anyhow::anyhow!("Failed to bind to {address}: {e}")
        })?;
        tracing::info!(address = %address, "Server listening");

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!(error = %e, "Scheduler shutdown failed");
        }
        served?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
