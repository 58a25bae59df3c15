//! # Errors Collector
//!
//! Aggregates per-artifact failures across a whole run and persists them once
//! at the end.
//!
//! ## Overview
//!
//! Trackers, sources and workers report soft failures here instead of
//! aborting. Each repository keeps at most [`MAX_ERRORS_PER_REPOSITORY`]
//! messages; anything beyond that is dropped silently. [`ErrorsCollector::flush`]
//! writes every repository's list as sorted, newline-joined text, or clears
//! it when the run produced no errors for that repository.

use bridge_traits::RepositoryManager;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, instrument};

/// Upper bound of messages kept per repository.
pub const MAX_ERRORS_PER_REPOSITORY: usize = 100;

/// Thread-safe, per-repository error sink.
pub struct ErrorsCollector {
    repository_manager: Arc<dyn RepositoryManager>,
    errors: Mutex<HashMap<String, Vec<String>>>,
}

impl ErrorsCollector {
    pub fn new(repository_manager: Arc<dyn RepositoryManager>) -> Self {
        Self {
            repository_manager,
            errors: Mutex::new(HashMap::new()),
        }
    }

    /// Ensure the repository is flushed even if nothing is appended, so a
    /// clean run clears the previous errors.
    pub fn init(&self, repository_id: &str) {
        self.lock().entry(repository_id.to_string()).or_default();
    }

    pub fn append(&self, repository_id: &str, err: impl Into<String>) {
        let mut errors = self.lock();
        let entry = errors.entry(repository_id.to_string()).or_default();
        if entry.len() < MAX_ERRORS_PER_REPOSITORY {
            entry.push(err.into());
        }
    }

    /// Snapshot of the messages collected so far for a repository.
    pub fn errors(&self, repository_id: &str) -> Vec<String> {
        self.lock().get(repository_id).cloned().unwrap_or_default()
    }

    /// Persist the collected errors of every initialized repository.
    ///
    /// Must not run concurrently with `init`/`append`. A persistence failure
    /// is logged and the remaining repositories are still flushed.
    #[instrument(skip(self))]
    pub async fn flush(&self) {
        let drained: Vec<(String, Vec<String>)> = self.lock().drain().collect();

        for (repository_id, mut errors) in drained {
            let text = if errors.is_empty() {
                None
            } else {
                errors.sort();
                Some(errors.join("\n"))
            };
            debug!(
                repository_id = %repository_id,
                count = errors.len(),
                "Persisting tracking errors"
            );
            if let Err(e) = self
                .repository_manager
                .set_last_tracking_errors(&repository_id, text)
                .await
            {
                error!(
                    repository_id = %repository_id,
                    error = %e,
                    "Error setting repository last tracking errors"
                );
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<String>>> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
