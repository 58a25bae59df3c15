//! # Sync Coordinator
//!
//! Fans tracking out over the selected repositories.
//!
//! ## Overview
//!
//! The `SyncCoordinator` picks the repositories to process from the
//! configuration, runs one [`Tracker`] per repository in its own task and
//! bounds how many run at once with a semaphore (`concurrency`, one by
//! default). A failing or panicking tracker is logged and reported for its
//! repository; the others keep going. Once every task has returned the
//! errors collector is flushed exactly once.
//!
//! No new repository is started after cancellation. Trackers already
//! running observe the same token and stop at their next checkpoint.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{cancel_on_shutdown_signal, SyncCoordinator};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! cancel_on_shutdown_signal(cancel.clone());
//!
//! let coordinator = SyncCoordinator::new(services, cancel);
//! let summary = coordinator.run_all().await?;
//! println!("{} repositories tracked, {} failed", summary.tracked, summary.failed);
//! ```

use crate::error::{Result, SyncError};
use crate::services::TrackerServices;
use crate::tracker::{Tracker, TrackingStats};
use bridge_traits::{Repository, SearchRepositoryInput};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Outcome of a coordinator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Repositories whose content was reconciled.
    pub tracked: usize,
    /// Repositories skipped because the remote digest did not change.
    pub up_to_date: usize,
    pub failed: usize,
    /// Repositories not started or interrupted by cancellation.
    pub cancelled: usize,
}

pub struct SyncCoordinator {
    services: TrackerServices,
    cancel: CancellationToken,
}

impl SyncCoordinator {
    pub fn new(services: TrackerServices, cancel: CancellationToken) -> Self {
        Self { services, cancel }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Repositories to track: the configured names, else the configured
    /// kinds, else every repository. Disabled repositories are left out.
    #[instrument(skip(self))]
    pub async fn select_repositories(&self) -> Result<Vec<Repository>> {
        let config = &self.services.config;
        let rm = &self.services.repository_manager;

        let repositories = if !config.repositories_names.is_empty() {
            let mut repositories = Vec::with_capacity(config.repositories_names.len());
            for name in &config.repositories_names {
                let repository = rm.get_by_name(name, true).await.map_err(|e| {
                    SyncError::RepositorySelection(format!(
                        "error getting repository {}: {}",
                        name, e
                    ))
                })?;
                repositories.push(repository);
            }
            repositories
        } else {
            rm.search(SearchRepositoryInput {
                kinds: config.repositories_kinds.clone(),
                include_credentials: true,
            })
            .await
            .map_err(|e| SyncError::RepositorySelection(e.to_string()))?
        };

        let selected: Vec<Repository> = repositories.into_iter().filter(|r| !r.disabled).collect();
        debug!(count = selected.len(), "Repositories selected");
        Ok(selected)
    }

    /// Select the repositories from the configuration and track them.
    pub async fn run_all(&self) -> Result<RunSummary> {
        let repositories = self.select_repositories().await?;
        Ok(self.run(repositories).await)
    }

    /// Track every repository and flush the collected errors.
    #[instrument(skip(self, repositories), fields(repositories = repositories.len()))]
    pub async fn run(&self, repositories: Vec<Repository>) -> RunSummary {
        let total = repositories.len();
        let semaphore = Arc::new(Semaphore::new(self.services.config.concurrency));
        let mut handles: Vec<(Repository, JoinHandle<Result<TrackingStats>>)> = Vec::new();

        for repository in repositories {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let services = self.services.clone();
            let cancel = self.cancel.clone();
            let tracked = repository.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                Tracker::new(services, tracked, cancel).run().await
            });
            handles.push((repository, handle));
        }

        let mut summary = RunSummary {
            cancelled: total - handles.len(),
            ..Default::default()
        };
        for (repository, handle) in handles {
            match handle.await {
                Ok(Ok(stats)) if stats.up_to_date => summary.up_to_date += 1,
                Ok(Ok(_)) => summary.tracked += 1,
                Ok(Err(e)) if e.is_cancelled() => {
                    debug!(repository = %repository.name, "Tracking interrupted");
                    summary.cancelled += 1;
                }
                Ok(Err(e)) => {
                    error!(repository = %repository.name, error = %e, "Error tracking repository");
                    self.services
                        .errors
                        .append(&repository.repository_id, e.to_string());
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(repository = %repository.name, error = %e, "Task panicked");
                    self.services
                        .errors
                        .append(&repository.repository_id, format!("tracker panicked: {}", e));
                    summary.failed += 1;
                }
            }
        }

        self.services.errors.flush().await;
        info!(
            tracked = summary.tracked,
            up_to_date = summary.up_to_date,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Tracking finished"
        );
        summary
    }
}

/// Cancel `cancel` on SIGINT, or SIGTERM on unix.
pub fn cancel_on_shutdown_signal(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_signal() => {
                info!("Shutdown signal received, cancelling tracking");
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    })
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Error installing interrupt handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Error installing terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
