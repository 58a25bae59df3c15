//! Fakes shared by the unit tests of this crate.

use async_trait::async_trait;
use bridge_traits::{
    error::Result as BridgeResult, BridgeError, RegisteredIndex, Repository, RepositoryManager,
    RepositoryMetadata, SearchRepositoryInput,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

/// Records the tracking errors written for each repository.
#[derive(Default)]
pub struct RecordingRepositoryManager {
    tracking_errors: Mutex<HashMap<String, Option<String>>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingRepositoryManager {
    /// `None` when nothing was persisted for the repository.
    pub fn tracking_errors(&self, repository_id: &str) -> Option<Option<String>> {
        self.tracking_errors.lock().unwrap().get(repository_id).cloned()
    }

    pub fn fail_tracking_errors_for(&self, repository_id: &str) {
        self.failing.lock().unwrap().insert(repository_id.to_string());
    }
}

#[async_trait]
impl RepositoryManager for RecordingRepositoryManager {
    async fn get_remote_digest(&self, _repository: &Repository) -> BridgeResult<String> {
        Ok(String::new())
    }

    async fn get_packages_digest(&self, _repository_id: &str) -> BridgeResult<RegisteredIndex> {
        Ok(RegisteredIndex::new())
    }

    async fn get_metadata(
        &self,
        _repository: &Repository,
        _base_path: Option<&Path>,
    ) -> BridgeResult<Option<RepositoryMetadata>> {
        Ok(None)
    }

    async fn set_verified_publisher(&self, _repository_id: &str, _verified: bool) -> BridgeResult<()> {
        Ok(())
    }

    async fn update_digest(&self, _repository_id: &str, _digest: &str) -> BridgeResult<()> {
        Ok(())
    }

    async fn set_last_tracking_errors(
        &self,
        repository_id: &str,
        errors: Option<String>,
    ) -> BridgeResult<()> {
        if self.failing.lock().unwrap().contains(repository_id) {
            return Err(BridgeError::DatabaseError("connection lost".to_string()));
        }
        self.tracking_errors
            .lock()
            .unwrap()
            .insert(repository_id.to_string(), errors);
        Ok(())
    }

    async fn get_by_name(&self, name: &str, _include_credentials: bool) -> BridgeResult<Repository> {
        Err(BridgeError::NotAvailable(name.to_string()))
    }

    async fn search(&self, _input: SearchRepositoryInput) -> BridgeResult<Vec<Repository>> {
        Ok(Vec::new())
    }
}
