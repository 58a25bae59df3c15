//! # Tracker Services
//!
//! Collaborators shared by every tracker, source and worker of a run.
//!
//! ## Overview
//!
//! [`TrackerServices`] is cheap to clone (every field is an `Arc`) and is
//! built once per process with [`TrackerServicesBuilder`]. The builder fails
//! fast with [`SyncError::CapabilityMissing`] when a collaborator was not
//! provided, and creates the process wide [`ErrorsCollector`] and
//! [`RateLimiter`] from the configuration.
//!
//! ## Usage
//!
//! ```ignore
//! let services = TrackerServices::builder(config)
//!     .repository_manager(rm)
//!     .package_manager(pm)
//!     .repository_cloner(Arc::new(GitCloner::new()))
//!     .oci_exporter(exporter)
//!     .artifact_parser(parser)
//!     .helm_index_loader(index_loader)
//!     .oci_registry(registry)
//!     .chart_parser(chart_parser)
//!     .http_client(Arc::new(ReqwestHttpClient::with_timeout(config.http_timeout)?))
//!     .image_store(image_store)
//!     .build()?;
//! ```

use crate::error::{Result, SyncError};
use crate::errors_collector::ErrorsCollector;
use crate::rate_limiter::RateLimiter;
use bridge_traits::{
    ArtifactParser, ChartArchiveParser, HelmIndexLoader, HttpClient, ImageStore, OciExporter,
    OciRegistry, PackageManager, RepositoryCloner, RepositoryManager,
};
use core_runtime::TrackerConfig;
use std::sync::Arc;

#[derive(Clone)]
pub struct TrackerServices {
    pub config: Arc<TrackerConfig>,
    pub repository_manager: Arc<dyn RepositoryManager>,
    pub package_manager: Arc<dyn PackageManager>,
    pub repository_cloner: Arc<dyn RepositoryCloner>,
    pub oci_exporter: Arc<dyn OciExporter>,
    pub artifact_parser: Arc<dyn ArtifactParser>,
    pub helm_index_loader: Arc<dyn HelmIndexLoader>,
    pub oci_registry: Arc<dyn OciRegistry>,
    pub chart_parser: Arc<dyn ChartArchiveParser>,
    pub http_client: Arc<dyn HttpClient>,
    pub image_store: Arc<dyn ImageStore>,
    pub errors: Arc<ErrorsCollector>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for TrackerServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerServices")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TrackerServices {
    pub fn builder(config: TrackerConfig) -> TrackerServicesBuilder {
        TrackerServicesBuilder::new(config)
    }
}

pub struct TrackerServicesBuilder {
    config: TrackerConfig,
    repository_manager: Option<Arc<dyn RepositoryManager>>,
    package_manager: Option<Arc<dyn PackageManager>>,
    repository_cloner: Option<Arc<dyn RepositoryCloner>>,
    oci_exporter: Option<Arc<dyn OciExporter>>,
    artifact_parser: Option<Arc<dyn ArtifactParser>>,
    helm_index_loader: Option<Arc<dyn HelmIndexLoader>>,
    oci_registry: Option<Arc<dyn OciRegistry>>,
    chart_parser: Option<Arc<dyn ChartArchiveParser>>,
    http_client: Option<Arc<dyn HttpClient>>,
    image_store: Option<Arc<dyn ImageStore>>,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl TrackerServicesBuilder {
    fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            repository_manager: None,
            package_manager: None,
            repository_cloner: None,
            oci_exporter: None,
            artifact_parser: None,
            helm_index_loader: None,
            oci_registry: None,
            chart_parser: None,
            http_client: None,
            image_store: None,
            rate_limiter: None,
        }
    }

    pub fn repository_manager(mut self, rm: Arc<dyn RepositoryManager>) -> Self {
        self.repository_manager = Some(rm);
        self
    }

    pub fn package_manager(mut self, pm: Arc<dyn PackageManager>) -> Self {
        self.package_manager = Some(pm);
        self
    }

    pub fn repository_cloner(mut self, cloner: Arc<dyn RepositoryCloner>) -> Self {
        self.repository_cloner = Some(cloner);
        self
    }

    pub fn oci_exporter(mut self, exporter: Arc<dyn OciExporter>) -> Self {
        self.oci_exporter = Some(exporter);
        self
    }

    pub fn artifact_parser(mut self, parser: Arc<dyn ArtifactParser>) -> Self {
        self.artifact_parser = Some(parser);
        self
    }

    pub fn helm_index_loader(mut self, loader: Arc<dyn HelmIndexLoader>) -> Self {
        self.helm_index_loader = Some(loader);
        self
    }

    pub fn oci_registry(mut self, registry: Arc<dyn OciRegistry>) -> Self {
        self.oci_registry = Some(registry);
        self
    }

    pub fn chart_parser(mut self, parser: Arc<dyn ChartArchiveParser>) -> Self {
        self.chart_parser = Some(parser);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn image_store(mut self, store: Arc<dyn ImageStore>) -> Self {
        self.image_store = Some(store);
        self
    }

    /// Share an existing limiter instead of building one from the config.
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn build(self) -> Result<TrackerServices> {
        let repository_manager = required(self.repository_manager, "RepositoryManager")?;
        let errors = Arc::new(ErrorsCollector::new(Arc::clone(&repository_manager)));
        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::from_config(&self.config.rate_limit)));

        Ok(TrackerServices {
            repository_manager,
            package_manager: required(self.package_manager, "PackageManager")?,
            repository_cloner: required(self.repository_cloner, "RepositoryCloner")?,
            oci_exporter: required(self.oci_exporter, "OciExporter")?,
            artifact_parser: required(self.artifact_parser, "ArtifactParser")?,
            helm_index_loader: required(self.helm_index_loader, "HelmIndexLoader")?,
            oci_registry: required(self.oci_registry, "OciRegistry")?,
            chart_parser: required(self.chart_parser, "ChartArchiveParser")?,
            http_client: required(self.http_client, "HttpClient")?,
            image_store: required(self.image_store, "ImageStore")?,
            config: Arc::new(self.config),
            errors,
            rate_limiter,
        })
    }
}

fn required<T: ?Sized>(value: Option<Arc<T>>, capability: &str) -> Result<Arc<T>> {
    value.ok_or_else(|| SyncError::CapabilityMissing {
        capability: capability.to_string(),
        message: format!("No {} implementation provided to the tracker", capability),
    })
}
