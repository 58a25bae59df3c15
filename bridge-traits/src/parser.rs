//! Artifact Format Contracts
//!
//! Each ecosystem describes its packages differently. The tracker only
//! walks repositories and compares versions; turning files, index entries
//! and archives into [`Package`] values is delegated to the traits below.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;

use crate::catalog::{Package, Repository};
use crate::error::Result;

/// Parses on-disk artifacts for the directory based sources.
#[async_trait]
pub trait ArtifactParser: Send + Sync {
    /// Build a package from a directory.
    ///
    /// Returns `Ok(None)` when the directory holds no package metadata file,
    /// which is not an error.
    async fn parse_package_dir(&self, repository: &Repository, dir: &Path)
        -> Result<Option<Package>>;

    /// Build a package from a single self describing file.
    async fn parse_package_file(&self, repository: &Repository, file: &Path) -> Result<Package>;

    /// Build a package from the manifest of a container image tag.
    async fn parse_container_image(&self, repository: &Repository, tag: &str) -> Result<Package>;
}

/// One entry of a Helm repository index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartVersion {
    pub name: String,
    pub version: String,
    pub urls: Vec<String>,
    pub digest: String,
    pub created: Option<DateTime<Utc>>,
}

/// A loaded Helm repository index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelmIndex {
    pub entries: Vec<ChartVersion>,
    /// Digest of the index file that was actually loaded.
    pub digest: String,
}

#[async_trait]
pub trait HelmIndexLoader: Send + Sync {
    async fn load_index(&self, repository: &Repository) -> Result<HelmIndex>;
}

/// Media type of the layer holding a packaged chart.
pub const CHART_CONTENT_MEDIA_TYPE: &str = "application/vnd.cncf.helm.chart.content.v1.tar+gzip";

/// Media type of the layer holding a chart provenance file.
pub const CHART_PROVENANCE_MEDIA_TYPE: &str = "application/vnd.cncf.helm.chart.provenance.v1.prov";

/// Read access to OCI hosted repositories.
#[async_trait]
pub trait OciRegistry: Send + Sync {
    /// Tags published for the repository.
    async fn tags(&self, repository: &Repository) -> Result<Vec<String>>;

    /// Content of the first layer with the given media type, if the
    /// referenced artifact has one.
    async fn pull_layer(
        &self,
        repository: &Repository,
        reference: &str,
        media_type: &str,
    ) -> Result<Option<Bytes>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartMaintainer {
    pub name: String,
    pub email: Option<String>,
}

/// Metadata extracted from a chart archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartArchive {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub home: Option<String>,
    pub icon: Option<String>,
    pub app_version: Option<String>,
    pub deprecated: bool,
    pub readme: Option<String>,
    pub license: Option<String>,
    pub maintainers: Vec<ChartMaintainer>,
    pub sources: Vec<String>,
    pub annotations: HashMap<String, String>,
}

pub trait ChartArchiveParser: Send + Sync {
    fn parse(&self, archive: &[u8]) -> Result<ChartArchive>;
}
