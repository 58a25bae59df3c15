//! Repository Persistence Contracts
//!
//! The tracker never talks to storage directly; everything it reads or
//! writes about a repository goes through [`RepositoryManager`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::catalog::{RegisteredIndex, Repository, RepositoryKind, RepositoryMetadata};
use crate::error::Result;

/// Filters accepted by [`RepositoryManager::search`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRepositoryInput {
    /// Restrict to these kinds; empty means every kind.
    pub kinds: Vec<RepositoryKind>,
    pub include_credentials: bool,
}

/// Durable repository state.
#[async_trait]
pub trait RepositoryManager: Send + Sync {
    /// Current digest of the remote content, or an empty string when the
    /// repository kind has no cheap way to compute one.
    async fn get_remote_digest(&self, repository: &Repository) -> Result<String>;

    /// Digest of every package version registered for the repository.
    async fn get_packages_digest(&self, repository_id: &str) -> Result<RegisteredIndex>;

    /// Metadata file published by the repository, if any.
    ///
    /// `base_path` is the local copy of the repository content, absent for
    /// kinds that are not acquired locally.
    async fn get_metadata(
        &self,
        repository: &Repository,
        base_path: Option<&Path>,
    ) -> Result<Option<RepositoryMetadata>>;

    async fn set_verified_publisher(&self, repository_id: &str, verified: bool) -> Result<()>;

    async fn update_digest(&self, repository_id: &str, digest: &str) -> Result<()>;

    /// Persist the errors of the latest tracking run; `None` clears them.
    async fn set_last_tracking_errors(
        &self,
        repository_id: &str,
        errors: Option<String>,
    ) -> Result<()>;

    async fn get_by_name(&self, name: &str, include_credentials: bool) -> Result<Repository>;

    async fn search(&self, input: SearchRepositoryInput) -> Result<Vec<Repository>>;
}

/// Result of cloning a repository into a scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClonedRepository {
    /// Directory to remove once tracking is done.
    pub tmp_dir: PathBuf,
    /// Directory holding the packages (may be a subpath of `tmp_dir`).
    pub packages_path: PathBuf,
}

/// Fetches VCS backed repositories.
#[async_trait]
pub trait RepositoryCloner: Send + Sync {
    async fn clone_repository(&self, repository: &Repository) -> Result<ClonedRepository>;
}

/// Exports OCI hosted catalogs into a local directory.
#[async_trait]
pub trait OciExporter: Send + Sync {
    /// Returns the scratch directory holding the exported content.
    async fn export_repository(&self, repository: &Repository) -> Result<PathBuf>;
}
