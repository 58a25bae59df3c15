//! Fakes for the tracking integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    error::Result as BridgeResult, ArtifactParser, BridgeError, ChartArchive, ChartArchiveParser,
    ChartVersion, ClonedRepository, HelmIndex, HelmIndexLoader, HttpClient, HttpRequest,
    HttpResponse, ImageStore, OciExporter, OciRegistry, Package, PackageKey, PackageManager,
    RegisteredIndex, Repository, RepositoryCloner, RepositoryKind, RepositoryManager,
    RepositoryMetadata, SearchRepositoryInput,
};
use bytes::Bytes;
use core_runtime::TrackerConfig;
use core_sync::TrackerServices;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const CHARTS_URL: &str = "https://charts.example.com";

// ============================================================================
// Repository manager
// ============================================================================

#[derive(Default)]
pub struct FakeRepositoryManager {
    pub repositories: Mutex<Vec<Repository>>,
    pub remote_digest: Mutex<String>,
    pub registered: Mutex<HashMap<String, RegisteredIndex>>,
    pub metadata: Mutex<Option<RepositoryMetadata>>,
    pub fail_metadata: Mutex<bool>,
    pub verified_calls: Mutex<Vec<(String, bool)>>,
    pub digest_updates: Mutex<Vec<(String, String)>>,
    pub tracking_errors: Mutex<HashMap<String, Option<String>>>,
}

impl FakeRepositoryManager {
    pub fn add_repository(&self, repository: Repository) {
        self.repositories.lock().unwrap().push(repository);
    }

    pub fn set_remote_digest(&self, digest: &str) {
        *self.remote_digest.lock().unwrap() = digest.to_string();
    }

    pub fn set_registered(&self, repository_id: &str, entries: &[(&str, &str, &str)]) {
        let index = entries
            .iter()
            .map(|(name, version, digest)| (PackageKey::new(*name, *version), digest.to_string()))
            .collect();
        self.registered
            .lock()
            .unwrap()
            .insert(repository_id.to_string(), index);
    }

    pub fn set_metadata(&self, metadata: Option<RepositoryMetadata>) {
        *self.metadata.lock().unwrap() = metadata;
    }

    pub fn repository(&self, repository_id: &str) -> Repository {
        self.repositories
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.repository_id == repository_id)
            .cloned()
            .unwrap()
    }

    pub fn verified_calls(&self) -> Vec<(String, bool)> {
        self.verified_calls.lock().unwrap().clone()
    }

    pub fn digest_updates(&self) -> Vec<(String, String)> {
        self.digest_updates.lock().unwrap().clone()
    }

    pub fn tracking_errors(&self, repository_id: &str) -> Option<Option<String>> {
        self.tracking_errors.lock().unwrap().get(repository_id).cloned()
    }

    fn update_repository(&self, repository_id: &str, f: impl FnOnce(&mut Repository)) {
        if let Some(repository) = self
            .repositories
            .lock()
            .unwrap()
            .iter_mut()
            .find(|r| r.repository_id == repository_id)
        {
            f(repository);
        }
    }
}

#[async_trait]
impl RepositoryManager for FakeRepositoryManager {
    async fn get_remote_digest(&self, _repository: &Repository) -> BridgeResult<String> {
        Ok(self.remote_digest.lock().unwrap().clone())
    }

    async fn get_packages_digest(&self, repository_id: &str) -> BridgeResult<RegisteredIndex> {
        Ok(self
            .registered
            .lock()
            .unwrap()
            .get(repository_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_metadata(
        &self,
        _repository: &Repository,
        _base_path: Option<&Path>,
    ) -> BridgeResult<Option<RepositoryMetadata>> {
        if *self.fail_metadata.lock().unwrap() {
            return Err(BridgeError::OperationFailed("invalid metadata file".to_string()));
        }
        Ok(self.metadata.lock().unwrap().clone())
    }

    async fn set_verified_publisher(&self, repository_id: &str, verified: bool) -> BridgeResult<()> {
        self.verified_calls
            .lock()
            .unwrap()
            .push((repository_id.to_string(), verified));
        self.update_repository(repository_id, |r| r.verified_publisher = verified);
        Ok(())
    }

    async fn update_digest(&self, repository_id: &str, digest: &str) -> BridgeResult<()> {
        self.digest_updates
            .lock()
            .unwrap()
            .push((repository_id.to_string(), digest.to_string()));
        self.update_repository(repository_id, |r| r.digest = Some(digest.to_string()));
        Ok(())
    }

    async fn set_last_tracking_errors(
        &self,
        repository_id: &str,
        errors: Option<String>,
    ) -> BridgeResult<()> {
        self.tracking_errors
            .lock()
            .unwrap()
            .insert(repository_id.to_string(), errors);
        Ok(())
    }

    async fn get_by_name(&self, name: &str, _include_credentials: bool) -> BridgeResult<Repository> {
        self.repositories
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| BridgeError::NotAvailable(format!("repository {} not found", name)))
    }

    async fn search(&self, input: SearchRepositoryInput) -> BridgeResult<Vec<Repository>> {
        Ok(self
            .repositories
            .lock()
            .unwrap()
            .iter()
            .filter(|r| input.kinds.is_empty() || input.kinds.contains(&r.kind))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Package manager
// ============================================================================

/// Records register/unregister calls; keys listed in `failing` are rejected.
#[derive(Default)]
pub struct RecordingPackageManager {
    pub registered: Mutex<Vec<Package>>,
    pub unregistered: Mutex<Vec<String>>,
    pub failing: Mutex<HashSet<String>>,
}

impl RecordingPackageManager {
    pub fn fail_for(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn registered_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .registered
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.key().to_string())
            .collect();
        keys.sort();
        keys
    }

    pub fn registered_package(&self, key: &str) -> Option<Package> {
        self.registered
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.key().to_string() == key)
            .cloned()
    }

    pub fn unregistered_keys(&self) -> Vec<String> {
        let mut keys = self.unregistered.lock().unwrap().clone();
        keys.sort();
        keys
    }

    pub fn total_calls(&self) -> usize {
        self.registered.lock().unwrap().len() + self.unregistered.lock().unwrap().len()
    }
}

#[async_trait]
impl PackageManager for RecordingPackageManager {
    async fn register(&self, package: &Package) -> BridgeResult<()> {
        let key = package.key().to_string();
        if self.failing.lock().unwrap().contains(&key) {
            return Err(BridgeError::DatabaseError("constraint violation".to_string()));
        }
        self.registered.lock().unwrap().push(package.clone());
        Ok(())
    }

    async fn unregister(&self, name: &str, version: &str, _repository_id: &str) -> BridgeResult<()> {
        let key = format!("{}@{}", name, version);
        if self.failing.lock().unwrap().contains(&key) {
            return Err(BridgeError::DatabaseError("constraint violation".to_string()));
        }
        self.unregistered.lock().unwrap().push(key);
        Ok(())
    }
}

// ============================================================================
// Content acquisition
// ============================================================================

/// Materializes one directory per package, each holding a `package.txt`
/// file with `name version digest`.
#[derive(Default)]
pub struct FakeCloner {
    pub packages: Mutex<Vec<(String, String, String)>>,
    pub broken_dirs: Mutex<Vec<String>>,
    pub last_tmp_dir: Mutex<Option<PathBuf>>,
}

impl FakeCloner {
    pub fn add_package(&self, name: &str, version: &str, digest: &str) {
        self.packages
            .lock()
            .unwrap()
            .push((name.to_string(), version.to_string(), digest.to_string()));
    }

    pub fn add_broken_dir(&self, dir: &str) {
        self.broken_dirs.lock().unwrap().push(dir.to_string());
    }

    pub fn last_tmp_dir(&self) -> Option<PathBuf> {
        self.last_tmp_dir.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositoryCloner for FakeCloner {
    async fn clone_repository(&self, _repository: &Repository) -> BridgeResult<ClonedRepository> {
        let tmp_dir = std::env::temp_dir().join(format!("tracker-test-{}", uuid::Uuid::new_v4()));
        let packages_path = tmp_dir.join("packages");
        std::fs::create_dir_all(&packages_path)?;
        for (name, version, digest) in self.packages.lock().unwrap().iter() {
            let dir = packages_path.join(format!("{}-{}", name, version));
            std::fs::create_dir_all(&dir)?;
            std::fs::write(dir.join("package.txt"), format!("{} {} {}", name, version, digest))?;
        }
        for broken in self.broken_dirs.lock().unwrap().iter() {
            let dir = packages_path.join(broken);
            std::fs::create_dir_all(&dir)?;
            std::fs::write(dir.join("package.txt"), "garbage")?;
        }
        *self.last_tmp_dir.lock().unwrap() = Some(tmp_dir.clone());
        Ok(ClonedRepository {
            tmp_dir,
            packages_path,
        })
    }
}

pub struct UnusedExporter;

#[async_trait]
impl OciExporter for UnusedExporter {
    async fn export_repository(&self, _repository: &Repository) -> BridgeResult<PathBuf> {
        Err(BridgeError::NotAvailable("oci export".to_string()))
    }
}

// ============================================================================
// Parsers
// ============================================================================

/// Reads the `package.txt` files written by [`FakeCloner`] and builds
/// container image packages from a tag to digest table.
#[derive(Default)]
pub struct FakeArtifactParser {
    pub image_digests: Mutex<HashMap<String, String>>,
    pub image_calls: Mutex<Vec<String>>,
}

impl FakeArtifactParser {
    pub fn set_image_digest(&self, tag: &str, digest: &str) {
        self.image_digests
            .lock()
            .unwrap()
            .insert(tag.to_string(), digest.to_string());
    }

    pub fn image_calls(&self) -> Vec<String> {
        self.image_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactParser for FakeArtifactParser {
    async fn parse_package_dir(
        &self,
        _repository: &Repository,
        dir: &Path,
    ) -> BridgeResult<Option<Package>> {
        let file = dir.join("package.txt");
        if !file.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&file)?;
        let fields: Vec<&str> = content.split_whitespace().collect();
        match fields.as_slice() {
            [name, version, digest] => {
                let mut package = Package::new(*name, *version);
                package.digest = digest.to_string();
                Ok(Some(package))
            }
            _ => Err(BridgeError::OperationFailed("invalid package file".to_string())),
        }
    }

    async fn parse_package_file(&self, _repository: &Repository, file: &Path) -> BridgeResult<Package> {
        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Package::new(stem, "1.0.0"))
    }

    async fn parse_container_image(&self, repository: &Repository, tag: &str) -> BridgeResult<Package> {
        self.image_calls.lock().unwrap().push(tag.to_string());
        let digest = self
            .image_digests
            .lock()
            .unwrap()
            .get(tag)
            .cloned()
            .ok_or_else(|| BridgeError::OperationFailed(format!("manifest unknown: {}", tag)))?;
        let name = repository.url.rsplit('/').next().unwrap_or_default();
        let mut package = Package::new(name, tag);
        package.digest = digest;
        Ok(package)
    }
}

/// Helm index served from memory.
#[derive(Default)]
pub struct FakeHelmIndexLoader {
    pub index: Mutex<HelmIndex>,
}

impl FakeHelmIndexLoader {
    pub fn set_entries(&self, digest: &str, entries: &[(&str, &str, &str)]) {
        let entries = entries
            .iter()
            .map(|(name, version, digest)| ChartVersion {
                name: name.to_string(),
                version: version.to_string(),
                urls: vec![format!("charts/{}-{}.tgz", name, version)],
                digest: digest.to_string(),
                created: None,
            })
            .collect();
        *self.index.lock().unwrap() = HelmIndex {
            entries,
            digest: digest.to_string(),
        };
    }

    pub fn push_entry(&self, entry: ChartVersion) {
        self.index.lock().unwrap().entries.push(entry);
    }
}

#[async_trait]
impl HelmIndexLoader for FakeHelmIndexLoader {
    async fn load_index(&self, _repository: &Repository) -> BridgeResult<HelmIndex> {
        Ok(self.index.lock().unwrap().clone())
    }
}

pub struct UnusedOciRegistry;

#[async_trait]
impl OciRegistry for UnusedOciRegistry {
    async fn tags(&self, _repository: &Repository) -> BridgeResult<Vec<String>> {
        Err(BridgeError::NotAvailable("oci registry".to_string()))
    }

    async fn pull_layer(
        &self,
        _repository: &Repository,
        _reference: &str,
        _media_type: &str,
    ) -> BridgeResult<Option<Bytes>> {
        Err(BridgeError::NotAvailable("oci registry".to_string()))
    }
}

/// The "archive" is the chart URL served by [`FakeHttpClient`].
///
/// URLs containing `broken` fail to parse, `deprecated` marks the chart
/// deprecated and `boom` panics.
pub struct FakeChartParser;

impl ChartArchiveParser for FakeChartParser {
    fn parse(&self, archive: &[u8]) -> BridgeResult<ChartArchive> {
        let url = String::from_utf8_lossy(archive).to_string();
        if url.contains("boom") {
            panic!("corrupted archive {}", url);
        }
        if url.contains("broken") {
            return Err(BridgeError::OperationFailed("invalid chart archive".to_string()));
        }
        Ok(ChartArchive {
            description: Some(format!("chart served from {}", url)),
            icon: Some(format!("{}/icon.png", CHARTS_URL)),
            deprecated: url.contains("deprecated"),
            ..Default::default()
        })
    }
}

// ============================================================================
// HTTP and images
// ============================================================================

/// Serves the request URL back as body. Provenance files exist only for
/// URLs listed in `signed`; URLs in `statuses` answer with that status and
/// URLs in `unreachable` fail at the connection level.
#[derive(Default)]
pub struct FakeHttpClient {
    pub requests: Mutex<Vec<String>>,
    pub signed: Mutex<HashSet<String>>,
    pub statuses: Mutex<HashMap<String, u16>>,
    pub unreachable: Mutex<HashSet<String>>,
}

impl FakeHttpClient {
    pub fn sign(&self, chart_url: &str) {
        self.signed.lock().unwrap().insert(chart_url.to_string());
    }

    pub fn respond_with(&self, url: &str, status: u16) {
        self.statuses.lock().unwrap().insert(url.to_string(), status);
    }

    pub fn make_unreachable(&self, url: &str) {
        self.unreachable.lock().unwrap().insert(url.to_string());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for FakeHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.url.clone());
        if self.unreachable.lock().unwrap().contains(&request.url) {
            return Err(BridgeError::OperationFailed("connection refused".to_string()));
        }
        if let Some(status) = self.statuses.lock().unwrap().get(&request.url) {
            return Ok(HttpResponse {
                status: *status,
                headers: HashMap::new(),
                body: Bytes::new(),
            });
        }
        let status = match request.url.strip_suffix(".prov") {
            Some(chart_url) if self.signed.lock().unwrap().contains(chart_url) => 200,
            Some(_) => 404,
            None => 200,
        };
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(request.url.into_bytes()),
        })
    }
}

#[derive(Default)]
pub struct RecordingImageStore {
    pub saved: Mutex<Vec<Bytes>>,
    pub failing: Mutex<bool>,
}

impl RecordingImageStore {
    pub fn fail_saves(&self) {
        *self.failing.lock().unwrap() = true;
    }
}

#[async_trait]
impl ImageStore for RecordingImageStore {
    async fn save_image(&self, data: Bytes) -> BridgeResult<String> {
        if *self.failing.lock().unwrap() {
            return Err(BridgeError::OperationFailed("unsupported image format".to_string()));
        }
        let mut saved = self.saved.lock().unwrap();
        saved.push(data);
        Ok(format!("image-{}", saved.len()))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub rm: Arc<FakeRepositoryManager>,
    pub pm: Arc<RecordingPackageManager>,
    pub cloner: Arc<FakeCloner>,
    pub parser: Arc<FakeArtifactParser>,
    pub index: Arc<FakeHelmIndexLoader>,
    pub http: Arc<FakeHttpClient>,
    pub images: Arc<RecordingImageStore>,
    pub services: TrackerServices,
}

impl Harness {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_package_manager(config, Arc::new(RecordingPackageManager::default()))
    }

    pub fn with_package_manager(config: TrackerConfig, pm: Arc<RecordingPackageManager>) -> Self {
        let package_manager: Arc<dyn PackageManager> = pm.clone();
        Self::build(config, pm, package_manager)
    }

    /// Route package writes to another implementation (e.g. a mock).
    pub fn with_dyn_package_manager(config: TrackerConfig, package_manager: Arc<dyn PackageManager>) -> Self {
        Self::build(config, Arc::new(RecordingPackageManager::default()), package_manager)
    }

    fn build(
        config: TrackerConfig,
        pm: Arc<RecordingPackageManager>,
        package_manager: Arc<dyn PackageManager>,
    ) -> Self {
        let rm = Arc::new(FakeRepositoryManager::default());
        let cloner = Arc::new(FakeCloner::default());
        let parser = Arc::new(FakeArtifactParser::default());
        let index = Arc::new(FakeHelmIndexLoader::default());
        let http = Arc::new(FakeHttpClient::default());
        let images = Arc::new(RecordingImageStore::default());

        let services = TrackerServices::builder(config)
            .repository_manager(rm.clone())
            .package_manager(package_manager)
            .repository_cloner(cloner.clone())
            .oci_exporter(Arc::new(UnusedExporter))
            .artifact_parser(parser.clone())
            .helm_index_loader(index.clone())
            .oci_registry(Arc::new(UnusedOciRegistry))
            .chart_parser(Arc::new(FakeChartParser))
            .http_client(http.clone())
            .image_store(images.clone())
            .build()
            .unwrap();

        Self {
            rm,
            pm,
            cloner,
            parser,
            index,
            http,
            images,
            services,
        }
    }
}

pub fn default_config() -> TrackerConfig {
    TrackerConfig::builder().build().unwrap()
}

pub fn helm_repository(id: &str) -> Repository {
    Repository::new(id, format!("{}-charts", id), RepositoryKind::Helm, CHARTS_URL)
}

pub fn chart_url(name: &str, version: &str) -> String {
    format!("{}/charts/{}-{}.tgz", CHARTS_URL, name, version)
}

pub fn icon_url() -> String {
    format!("{}/icon.png", CHARTS_URL)
}
