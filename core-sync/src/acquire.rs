//! Local acquisition of repository content.
//!
//! Helm and container repositories are read remotely. OLM catalogs hosted
//! in an OCI registry are exported, every other kind is cloned. The scratch
//! directory is removed when [`AcquiredContent`] is dropped, whatever the
//! outcome of the run.

use crate::error::{Result, SyncError};
use crate::services::TrackerServices;
use bridge_traits::{Repository, RepositoryKind};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Removes a directory tree on drop.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.path.as_os_str().is_empty() {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed scratch directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Error removing scratch directory"
            ),
        }
    }
}

/// Content available to the source for one run.
#[derive(Debug, Default)]
pub struct AcquiredContent {
    base_path: Option<PathBuf>,
    _scratch: Option<ScratchDir>,
}

impl AcquiredContent {
    pub fn remote() -> Self {
        Self::default()
    }

    pub fn local(base_path: PathBuf, scratch: ScratchDir) -> Self {
        Self {
            base_path: Some(base_path),
            _scratch: Some(scratch),
        }
    }

    /// Directory holding the packages, absent for remote kinds.
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }
}

/// How a repository's content is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMethod {
    Remote,
    OciExport,
    Clone,
}

impl AcquireMethod {
    pub fn for_repository(repository: &Repository) -> Self {
        match repository.kind {
            RepositoryKind::Helm | RepositoryKind::Container => AcquireMethod::Remote,
            RepositoryKind::Olm if repository.is_oci() => AcquireMethod::OciExport,
            _ => AcquireMethod::Clone,
        }
    }
}

#[instrument(skip(services, repository), fields(repository = %repository.name))]
pub async fn acquire_content(
    services: &TrackerServices,
    repository: &Repository,
) -> Result<AcquiredContent> {
    match AcquireMethod::for_repository(repository) {
        AcquireMethod::Remote => Ok(AcquiredContent::remote()),
        AcquireMethod::OciExport => {
            let tmp_dir = services
                .oci_exporter
                .export_repository(repository)
                .await
                .map_err(SyncError::Acquire)?;
            debug!(path = %tmp_dir.display(), "Repository exported");
            Ok(AcquiredContent::local(tmp_dir.clone(), ScratchDir::new(tmp_dir)))
        }
        AcquireMethod::Clone => {
            let cloned = services
                .repository_cloner
                .clone_repository(repository)
                .await
                .map_err(SyncError::Acquire)?;
            debug!(path = %cloned.packages_path.display(), "Repository cloned");
            Ok(AcquiredContent::local(
                cloned.packages_path,
                ScratchDir::new(cloned.tmp_dir),
            ))
        }
    }
}
