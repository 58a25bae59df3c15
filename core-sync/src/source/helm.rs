//! # Helm Source
//!
//! Charts listed in a repository index (HTTP repositories) or in the tags of
//! an OCI repository.
//!
//! Discovery only reads the index, so [`HelmSource::packages_available`]
//! returns lightweight packages (name, normalized version, digest and chart
//! URL). Downloading and parsing the chart archive of the versions that
//! actually need registering happens in [`HelmJobHandler`] on the worker
//! pool.

use super::container::image_name;
use super::SourceInput;
use crate::error::{Result, SyncError};
use crate::services::TrackerServices;
use crate::worker::JobHandler;
use async_trait::async_trait;
use bridge_traits::{
    AvailableIndex, ChartArchive, ChartVersion, HttpMethod, HttpRequest, HttpResponse, Link,
    Maintainer,
    Package, Repository, CHART_CONTENT_MEDIA_TYPE, CHART_PROVENANCE_MEDIA_TYPE, OCI_PREFIX,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

const OPERATOR_ANNOTATION: &str = "artifacthub.io/operator";
const OPERATOR_CAPABILITIES_ANNOTATION: &str = "artifacthub.io/operatorCapabilities";

const VALID_OPERATOR_CAPABILITIES: &[&str] = &[
    "basic install",
    "seamless upgrades",
    "full lifecycle",
    "deep insights",
    "auto pilot",
];

pub struct HelmSource {
    input: SourceInput,
    handler: Arc<HelmJobHandler>,
}

impl HelmSource {
    pub fn new(input: SourceInput) -> Self {
        let handler = Arc::new(HelmJobHandler::new(
            input.repository.clone(),
            input.services.clone(),
            input.cancel.clone(),
        ));
        Self { input, handler }
    }

    pub fn job_handler(&self) -> Arc<dyn JobHandler> {
        self.handler.clone()
    }

    #[instrument(skip(self), fields(repository = %self.input.repository.name))]
    pub async fn packages_available(&self) -> Result<AvailableIndex> {
        let mut available = AvailableIndex::new();
        for chart_version in self.chart_versions().await? {
            self.input.check_cancelled()?;
            match self.prepare_package(&chart_version) {
                Ok(package) => {
                    available.insert(package.key(), package);
                }
                Err(message) => self.input.warn(format!(
                    "{} (package: {} version: {})",
                    message, chart_version.name, chart_version.version
                )),
            }
        }
        debug!(count = available.len(), "Chart versions available");
        Ok(available)
    }

    async fn chart_versions(&self) -> Result<Vec<ChartVersion>> {
        let repository = &self.input.repository;
        if repository.url.starts_with("http://") || repository.url.starts_with("https://") {
            let index = self
                .input
                .services
                .helm_index_loader
                .load_index(repository)
                .await
                .map_err(|e| {
                    SyncError::Discovery(format!("error loading repository index file: {}", e))
                })?;
            if !self.input.remote_digest.is_empty() && self.input.remote_digest != index.digest {
                return Err(SyncError::IndexMismatch);
            }
            Ok(index.entries)
        } else if repository.is_oci() {
            let tags = self
                .input
                .services
                .oci_registry
                .tags(repository)
                .await
                .map_err(|e| {
                    SyncError::Discovery(format!(
                        "error getting repository available versions: {}",
                        e
                    ))
                })?;
            let name = image_name(&repository.url).to_string();
            Ok(tags
                .into_iter()
                .map(|tag| ChartVersion {
                    name: name.clone(),
                    // Registries do not allow '+' in tags
                    urls: vec![format!("{}:{}", repository.url, tag.replacen('+', "_", 1))],
                    version: tag,
                    ..Default::default()
                })
                .collect())
        } else {
            Err(SyncError::Discovery(format!(
                "scheme not supported: {}",
                repository.url
            )))
        }
    }

    fn prepare_package(&self, chart_version: &ChartVersion) -> std::result::Result<Package, String> {
        let version = normalize_version(&chart_version.version)
            .map_err(|e| format!("invalid package version: {}", e))?;
        let chart_url = chart_version
            .urls
            .first()
            .ok_or_else(|| "chart version does not contain any url".to_string())?;
        let content_url = resolve_chart_url(&self.input.repository.url, chart_url)?;

        let mut package = Package::new(&chart_version.name, version);
        package.digest = chart_version.digest.clone();
        package.content_url = Some(content_url);
        package.created_at = chart_version.created;
        Ok(self.input.finalize(package))
    }
}

/// Normalize a chart version to strict semver.
///
/// A leading `v` is dropped and missing minor or patch components are
/// padded with zeros (`v1.2` becomes `1.2.0`).
pub fn normalize_version(version: &str) -> std::result::Result<String, semver::Error> {
    let trimmed = version.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);

    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.iter().all(|p| !p.is_empty()) {
        while parts.len() < 3 {
            parts.push("0");
        }
    }
    let candidate = format!("{}{}", parts.join("."), suffix);
    semver::Version::parse(&candidate).map(|v| v.to_string())
}

/// Resolve a chart URL from the index against the repository URL.
fn resolve_chart_url(repository_url: &str, chart_url: &str) -> std::result::Result<String, String> {
    match Url::parse(chart_url) {
        Ok(url) => Ok(url.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let mut base = Url::parse(repository_url)
                .map_err(|e| format!("invalid repository url {}: {}", repository_url, e))?;
            if !base.path().ends_with('/') {
                let path = format!("{}/", base.path());
                base.set_path(&path);
            }
            base.join(chart_url)
                .map(|url| url.to_string())
                .map_err(|e| format!("invalid chart url {}: {}", chart_url, e))
        }
        Err(e) => Err(format!("invalid chart url {}: {}", chart_url, e)),
    }
}

enum JobFailure {
    Cancelled,
    Failed { message: String, deprecated: bool },
}

impl JobFailure {
    fn failed(message: String) -> Self {
        JobFailure::Failed {
            message,
            deprecated: false,
        }
    }

    /// Carry the chart's deprecated flag, once known.
    fn deprecated(self, deprecated: bool) -> Self {
        match self {
            JobFailure::Failed { message, .. } => JobFailure::Failed {
                message,
                deprecated,
            },
            JobFailure::Cancelled => JobFailure::Cancelled,
        }
    }
}

/// Registers and unregisters Helm chart versions on the worker pool.
pub struct HelmJobHandler {
    repository: Repository,
    services: TrackerServices,
    cancel: CancellationToken,
}

impl HelmJobHandler {
    pub fn new(repository: Repository, services: TrackerServices, cancel: CancellationToken) -> Self {
        Self {
            repository,
            services,
            cancel,
        }
    }

    fn report(&self, name: &str, version: &str, failure: JobFailure) {
        match failure {
            JobFailure::Cancelled => {
                debug!(package = %name, version = %version, "Job interrupted by cancellation");
            }
            JobFailure::Failed {
                message,
                deprecated,
            } => {
                let message = format!("{} (package: {} version: {})", message, name, version);
                warn!(repository = %self.repository.name, "{}", message);
                // Deprecated chart versions are not worth surfacing to the owner
                if !deprecated {
                    self.services
                        .errors
                        .append(&self.repository.repository_id, message);
                }
            }
        }
    }

    async fn register(&self, mut package: Package, store_logo: bool) -> std::result::Result<(), JobFailure> {
        let content_url = package
            .content_url
            .clone()
            .ok_or_else(|| JobFailure::failed("package does not have a chart url".to_string()))?;

        let archive = self.fetch_chart(&content_url).await?;
        let chart = self
            .services
            .chart_parser
            .parse(&archive)
            .map_err(|e| JobFailure::failed(format!("error loading chart ({}): {}", content_url, e)))?;
        let deprecated = chart.deprecated;

        if store_logo {
            if let Some(icon) = chart.icon.clone().filter(|icon| !icon.is_empty()) {
                package.logo_url = Some(icon.clone());
                match self.store_logo(&icon).await {
                    Ok(image_id) => package.logo_image_id = Some(image_id),
                    Err(failure) => self.report(&package.name, &package.version, failure.deprecated(deprecated)),
                }
            }
        }
        match self.has_provenance(&content_url).await {
            Ok(signed) => package.signed = signed,
            Err(failure) => self.report(&package.name, &package.version, failure.deprecated(deprecated)),
        }
        if self.cancel.is_cancelled() {
            return Err(JobFailure::Cancelled);
        }
        merge_chart(&mut package, chart);

        self.services
            .package_manager
            .register(&package)
            .await
            .map_err(|e| JobFailure::Failed {
                message: format!("error registering package: {}", e),
                deprecated,
            })?;
        debug!(package = %package.name, version = %package.version, "Package registered");
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(HttpMethod::Get, url);
        if let (Some(user), Some(pass)) = (&self.repository.auth_user, &self.repository.auth_pass) {
            request = request.basic_auth(user, pass);
        }
        self.services
            .rate_limiter
            .execute(self.services.http_client.as_ref(), request, &self.cancel)
            .await
    }

    async fn fetch_chart(&self, content_url: &str) -> std::result::Result<Bytes, JobFailure> {
        let loading =
            |detail: String| JobFailure::failed(format!("error loading chart ({}): {}", content_url, detail));

        if content_url.starts_with(OCI_PREFIX) {
            return match self
                .services
                .oci_registry
                .pull_layer(&self.repository, content_url, CHART_CONTENT_MEDIA_TYPE)
                .await
            {
                Ok(Some(layer)) => Ok(layer),
                Ok(None) => Err(loading("chart content layer not found".to_string())),
                Err(e) => Err(loading(e.to_string())),
            };
        }
        match self.get(content_url).await {
            Ok(response) if response.is_success() => Ok(response.body),
            Ok(response) => Err(loading(format!(
                "unexpected status code received: {}",
                response.status
            ))),
            Err(SyncError::Cancelled) => Err(JobFailure::Cancelled),
            Err(e) => Err(loading(e.to_string())),
        }
    }

    /// Download the chart icon and hand it to the image store.
    async fn store_logo(&self, icon: &str) -> std::result::Result<String, JobFailure> {
        let data = match self.get(icon).await {
            Ok(response) if response.is_success() => response.body,
            Ok(response) => {
                return Err(JobFailure::failed(format!(
                    "error getting image {}: unexpected status code received: {}",
                    icon, response.status
                )))
            }
            Err(SyncError::Cancelled) => return Err(JobFailure::Cancelled),
            Err(e) => return Err(JobFailure::failed(format!("error getting image {}: {}", icon, e))),
        };
        self.services
            .image_store
            .save_image(data)
            .await
            .map_err(|e| JobFailure::failed(format!("error saving image {}: {}", icon, e)))
    }

    async fn has_provenance(&self, content_url: &str) -> std::result::Result<bool, JobFailure> {
        let checking =
            |detail: String| JobFailure::failed(format!("error checking provenance file: {}", detail));
        if content_url.starts_with(OCI_PREFIX) {
            return self
                .services
                .oci_registry
                .pull_layer(&self.repository, content_url, CHART_PROVENANCE_MEDIA_TYPE)
                .await
                .map(|layer| layer.is_some())
                .map_err(|e| checking(e.to_string()));
        }
        match self.get(&format!("{}.prov", content_url)).await {
            Ok(response) => Ok(response.status == 200),
            Err(SyncError::Cancelled) => Err(JobFailure::Cancelled),
            Err(e) => Err(checking(e.to_string())),
        }
    }
}

#[async_trait]
impl JobHandler for HelmJobHandler {
    async fn handle_register(&self, package: Package, store_logo: bool) {
        let name = package.name.clone();
        let version = package.version.clone();
        if let Err(failure) = self.register(package, store_logo).await {
            self.report(&name, &version, failure);
        }
    }

    async fn handle_unregister(&self, name: String, version: String) {
        if let Err(e) = self
            .services
            .package_manager
            .unregister(&name, &version, &self.repository.repository_id)
            .await
        {
            self.report(
                &name,
                &version,
                JobFailure::failed(format!("error unregistering package: {}", e)),
            );
        }
    }

    fn report_panic(&self, name: &str, version: &str) {
        self.report(name, version, JobFailure::failed("job panicked".to_string()));
    }
}

/// Copy the archive metadata onto the package prepared from the index.
fn merge_chart(package: &mut Package, chart: ChartArchive) {
    package.description = chart.description.filter(|d| !d.is_empty());
    package.keywords = chart.keywords;
    package.home_url = chart.home.filter(|h| !h.is_empty());
    package.app_version = chart.app_version.filter(|v| !v.is_empty());
    package.deprecated = chart.deprecated;
    package.readme = chart.readme;
    package.license = chart.license;
    package.maintainers = chart
        .maintainers
        .into_iter()
        .filter_map(|m| match m.email {
            Some(email) if !email.is_empty() => Some(Maintainer {
                name: m.name,
                email,
            }),
            _ => None,
        })
        .collect();
    package.links = chart
        .sources
        .into_iter()
        .filter(|url| !url.is_empty())
        .map(|url| Link {
            name: "source".to_string(),
            url,
        })
        .collect();

    let operator_annotation = chart
        .annotations
        .get(OPERATOR_ANNOTATION)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    package.is_operator = package.name.contains("operator") || operator_annotation;
    package.capabilities = chart
        .annotations
        .get(OPERATOR_CAPABILITIES_ANNOTATION)
        .map(|c| c.trim().to_lowercase())
        .filter(|c| VALID_OPERATOR_CAPABILITIES.contains(&c.as_str()));
}
