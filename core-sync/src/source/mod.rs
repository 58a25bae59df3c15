//! # Tracker Sources
//!
//! Discovery of the package versions a repository currently offers.
//!
//! ## Overview
//!
//! A [`TrackerSource`] is built once per run from a [`SourceInput`] and
//! answers a single question through [`TrackerSource::packages_available`].
//! The variant is picked from the repository kind:
//!
//! | Kind                                   | Variant       |
//! |----------------------------------------|---------------|
//! | `helm`                                 | `Helm`        |
//! | `container`                            | `Container`   |
//! | `falco` at the legacy security hub URL | `LegacyFalco` |
//! | everything else                        | `Generic`     |
//!
//! Sources fail wholesale only for structural problems. A single artifact
//! that cannot be read is logged, reported to the errors collector and
//! skipped. Cancellation is checked between artifacts.

mod container;
mod falco;
mod generic;
mod helm;

pub use container::ContainerSource;
pub use falco::LegacyFalcoSource;
pub use generic::GenericSource;
pub use helm::{normalize_version, HelmJobHandler, HelmSource};

use crate::error::{Result, SyncError};
use crate::services::TrackerServices;
use crate::worker::JobHandler;
use bridge_traits::{AvailableIndex, Package, RegisteredIndex, Repository, RepositoryKind};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Repository still published with the legacy security hub layout.
pub const LEGACY_FALCO_URL: &str =
    "https://github.com/falcosecurity/cloud-native-security-hub/resources/falco";

/// Everything a source needs for one run.
#[derive(Debug, Clone)]
pub struct SourceInput {
    pub repository: Repository,
    /// Remote digest observed at the start of the run (may be empty).
    pub remote_digest: String,
    pub registered: Arc<RegisteredIndex>,
    pub base_path: Option<PathBuf>,
    pub services: TrackerServices,
    pub cancel: CancellationToken,
}

impl SourceInput {
    /// Log an artifact level problem and report it for the repository.
    pub(crate) fn warn(&self, message: String) {
        warn!(repository = %self.repository.name, "{}", message);
        self.services
            .errors
            .append(&self.repository.repository_id, message);
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Stamp the repository and make sure the package has a digest.
    pub(crate) fn finalize(&self, mut package: Package) -> Package {
        package.repository_id = self.repository.repository_id.clone();
        if package.digest.is_empty() {
            package.digest = compute_digest(&package);
        }
        package
    }
}

/// SHA-256 of the package's JSON form, hex encoded.
pub fn compute_digest(package: &Package) -> String {
    let mut hasher = Sha256::new();
    match serde_json::to_vec(package) {
        Ok(bytes) => hasher.update(&bytes),
        Err(_) => hasher.update(package.key().to_string().as_bytes()),
    }
    format!("{:x}", hasher.finalize())
}

/// Source variants, selected from the repository kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceVariant {
    Generic,
    LegacyFalco,
    Helm,
    Container,
}

impl SourceVariant {
    pub fn for_repository(repository: &Repository) -> Self {
        match repository.kind {
            RepositoryKind::Helm => SourceVariant::Helm,
            RepositoryKind::Container => SourceVariant::Container,
            RepositoryKind::Falco if repository.url == LEGACY_FALCO_URL => {
                SourceVariant::LegacyFalco
            }
            _ => SourceVariant::Generic,
        }
    }
}

pub enum TrackerSource {
    Generic(GenericSource),
    LegacyFalco(LegacyFalcoSource),
    Helm(HelmSource),
    Container(ContainerSource),
}

impl TrackerSource {
    pub fn new(input: SourceInput) -> Self {
        match SourceVariant::for_repository(&input.repository) {
            SourceVariant::Generic => TrackerSource::Generic(GenericSource::new(input)),
            SourceVariant::LegacyFalco => TrackerSource::LegacyFalco(LegacyFalcoSource::new(input)),
            SourceVariant::Helm => TrackerSource::Helm(HelmSource::new(input)),
            SourceVariant::Container => TrackerSource::Container(ContainerSource::new(input)),
        }
    }

    pub fn variant(&self) -> SourceVariant {
        match self {
            TrackerSource::Generic(_) => SourceVariant::Generic,
            TrackerSource::LegacyFalco(_) => SourceVariant::LegacyFalco,
            TrackerSource::Helm(_) => SourceVariant::Helm,
            TrackerSource::Container(_) => SourceVariant::Container,
        }
    }

    pub async fn packages_available(&self) -> Result<AvailableIndex> {
        match self {
            TrackerSource::Generic(s) => s.packages_available().await,
            TrackerSource::LegacyFalco(s) => s.packages_available().await,
            TrackerSource::Helm(s) => s.packages_available().await,
            TrackerSource::Container(s) => s.packages_available().await,
        }
    }

    /// Handler for sources whose jobs run on the worker pool.
    pub fn job_handler(&self) -> Option<Arc<dyn JobHandler>> {
        match self {
            TrackerSource::Helm(s) => Some(s.job_handler()),
            _ => None,
        }
    }
}
