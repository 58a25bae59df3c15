//! # Repository Tracker
//!
//! Brings the catalog in line with what one repository currently offers.
//!
//! ## Overview
//!
//! A [`Tracker`] walks a linear sequence of states:
//!
//! 1. `DigestCheck`: stop early when the remote digest did not change
//! 2. `Init`: register the repository with the errors collector
//! 3. `Acquire`: clone or export the content when the kind needs it
//! 4. `LoadMetadata`: read the repository metadata file (soft)
//! 5. `LoadRegistered`: digests of the versions already in the catalog
//! 6. `Discover`: versions currently available through the source
//! 7. `Reconcile`: register new or changed versions (pool or inline)
//! 8. `Prune`: unregister versions gone from the repository or ignored
//! 9. `VerifiedPublisher`: persist the flag when it changed (soft)
//! 10. `DigestCommit`: remember the remote digest for the next run
//!
//! Steps 1, 3, 5 and 6 are fatal and surface as [`SyncError`]. Everything
//! else is reported to the errors collector and tracking goes on.
//! Cancellation is fatal too; the digest is then never committed so the
//! next run starts over.

use crate::acquire::acquire_content;
use crate::error::{Result, SyncError};
use crate::ignore::should_ignore_package;
use crate::services::TrackerServices;
use crate::source::{SourceInput, TrackerSource};
use crate::worker::{Job, JobHandler, WorkerPool};
use bridge_traits::{
    AvailableIndex, PackageKey, RegisteredIndex, Repository, RepositoryMetadata,
    DIGEST_NOT_CHANGED,
};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Pending,
    DigestCheck,
    Init,
    Acquire,
    LoadMetadata,
    LoadRegistered,
    Discover,
    Reconcile,
    Prune,
    VerifiedPublisher,
    DigestCommit,
    Done,
}

impl TrackerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerState::Pending => "pending",
            TrackerState::DigestCheck => "digest_check",
            TrackerState::Init => "init",
            TrackerState::Acquire => "acquire",
            TrackerState::LoadMetadata => "load_metadata",
            TrackerState::LoadRegistered => "load_registered",
            TrackerState::Discover => "discover",
            TrackerState::Reconcile => "reconcile",
            TrackerState::Prune => "prune",
            TrackerState::VerifiedPublisher => "verified_publisher",
            TrackerState::DigestCommit => "digest_commit",
            TrackerState::Done => "done",
        }
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one tracking run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingStats {
    /// The remote digest did not change, nothing else ran.
    pub up_to_date: bool,
    pub available: usize,
    pub registered: usize,
    pub unregistered: usize,
    pub unchanged: usize,
    pub ignored: usize,
}

pub struct Tracker {
    services: TrackerServices,
    repository: Repository,
    cancel: CancellationToken,
    state: TrackerState,
}

impl Tracker {
    pub fn new(services: TrackerServices, repository: Repository, cancel: CancellationToken) -> Self {
        Self {
            services,
            repository,
            cancel,
            state: TrackerState::Pending,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    #[instrument(
        skip(self),
        fields(repository = %self.repository.name, kind = %self.repository.kind)
    )]
    pub async fn run(&mut self) -> Result<TrackingStats> {
        let mut stats = TrackingStats::default();
        let rm = Arc::clone(&self.services.repository_manager);
        let repository_id = self.repository.repository_id.clone();

        self.enter(TrackerState::DigestCheck);
        let remote_digest = rm
            .get_remote_digest(&self.repository)
            .await
            .map_err(SyncError::RemoteDigest)?;
        if !self.services.config.bypass_digest_check
            && !remote_digest.is_empty()
            && self.repository.stored_digest() == Some(remote_digest.as_str())
        {
            debug!("Remote digest unchanged, skipping");
            self.enter(TrackerState::Done);
            stats.up_to_date = true;
            return Ok(stats);
        }
        self.check_cancelled()?;

        self.enter(TrackerState::Init);
        self.services.errors.init(&repository_id);

        self.enter(TrackerState::Acquire);
        // Removes the scratch directory when dropped
        let content = acquire_content(&self.services, &self.repository).await?;
        self.check_cancelled()?;

        self.enter(TrackerState::LoadMetadata);
        let metadata = match rm.get_metadata(&self.repository, content.base_path()).await {
            Ok(metadata) => metadata,
            Err(e) => {
                self.warn(format!("error getting repository metadata: {}", e));
                None
            }
        };

        self.enter(TrackerState::LoadRegistered);
        let registered = Arc::new(
            rm.get_packages_digest(&repository_id)
                .await
                .map_err(SyncError::RegisteredPackages)?,
        );

        self.enter(TrackerState::Discover);
        let source = TrackerSource::new(SourceInput {
            repository: self.repository.clone(),
            remote_digest: remote_digest.clone(),
            registered: Arc::clone(&registered),
            base_path: content.base_path().map(Path::to_path_buf),
            services: self.services.clone(),
            cancel: self.cancel.clone(),
        });
        let available = source.packages_available().await?;
        stats.available = available.len();
        debug!(
            available = available.len(),
            registered = registered.len(),
            "Packages discovered"
        );

        self.enter(TrackerState::Reconcile);
        let plan = plan_jobs(
            &available,
            &registered,
            metadata.as_ref(),
            self.services.config.bypass_digest_check,
            &mut stats,
        );
        let handler = source.job_handler();
        self.execute(handler.clone(), plan.register).await?;
        self.check_cancelled()?;

        self.enter(TrackerState::Prune);
        self.execute(handler, plan.unregister).await?;
        self.check_cancelled()?;

        self.enter(TrackerState::VerifiedPublisher);
        self.update_verified_publisher(metadata.as_ref()).await;

        self.enter(TrackerState::DigestCommit);
        if !remote_digest.is_empty() && self.repository.stored_digest() != Some(remote_digest.as_str())
        {
            if let Err(e) = rm.update_digest(&repository_id, &remote_digest).await {
                error!(error = %e, "Error updating repository digest");
            }
        }
        drop(content);

        self.enter(TrackerState::Done);
        info!(
            available = stats.available,
            registered = stats.registered,
            unregistered = stats.unregistered,
            unchanged = stats.unchanged,
            ignored = stats.ignored,
            "Repository tracked"
        );
        Ok(stats)
    }

    fn enter(&mut self, state: TrackerState) {
        debug!(state = %state, "Tracker state");
        self.state = state;
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn warn(&self, message: String) {
        warn!(repository = %self.repository.name, "{}", message);
        self.services
            .errors
            .append(&self.repository.repository_id, message);
    }

    /// Run jobs on the worker pool when the source has a handler, inline
    /// otherwise. Returns once every job finished.
    async fn execute(&self, handler: Option<Arc<dyn JobHandler>>, jobs: Vec<Job>) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }
        match handler {
            Some(handler) => {
                WorkerPool::new(self.services.config.num_workers)
                    .run(handler, jobs, self.cancel.clone())
                    .await
            }
            None => self.run_inline(jobs).await,
        }
    }

    /// Execute jobs one by one on the current task.
    async fn run_inline(&self, jobs: Vec<Job>) -> Result<()> {
        let pm = &self.services.package_manager;
        for job in jobs {
            self.check_cancelled()?;
            match job {
                Job::Register { package, .. } => {
                    if let Err(e) = pm.register(&package).await {
                        self.warn(format!(
                            "error registering package {} version {}: {}",
                            package.name, package.version, e
                        ));
                    }
                }
                Job::Unregister { name, version } => {
                    if let Err(e) = pm
                        .unregister(&name, &version, &self.repository.repository_id)
                        .await
                    {
                        self.warn(format!(
                            "error unregistering package {} version {}: {}",
                            name, version, e
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    async fn update_verified_publisher(&self, metadata: Option<&RepositoryMetadata>) {
        let verified = metadata
            .map(|md| !md.repository_id.is_empty() && md.repository_id == self.repository.repository_id)
            .unwrap_or(false);
        if verified == self.repository.verified_publisher {
            return;
        }
        if let Err(e) = self
            .services
            .repository_manager
            .set_verified_publisher(&self.repository.repository_id, verified)
            .await
        {
            self.warn(format!("error setting verified publisher flag: {}", e));
        }
    }
}

/// Jobs computed for one run, in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPlan {
    /// New or changed versions, run during `Reconcile`.
    pub register: Vec<Job>,
    /// Versions gone or ignored, run during `Prune`.
    pub unregister: Vec<Job>,
}

impl JobPlan {
    pub fn is_empty(&self) -> bool {
        self.register.is_empty() && self.unregister.is_empty()
    }

    pub fn len(&self) -> usize {
        self.register.len() + self.unregister.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.register.iter().chain(self.unregister.iter())
    }
}

/// Compute the register and unregister jobs for one run.
///
/// Nothing is removed when the repository offers no package at all, so a
/// transient empty listing never wipes the catalog.
pub fn plan_jobs(
    available: &AvailableIndex,
    registered: &RegisteredIndex,
    metadata: Option<&RepositoryMetadata>,
    bypass_digest_check: bool,
    stats: &mut TrackingStats,
) -> JobPlan {
    let newest = newest_versions(available);
    let mut plan = JobPlan::default();

    let mut available_keys: Vec<&PackageKey> = available.keys().collect();
    available_keys.sort();
    for key in available_keys {
        let package = &available[key];
        if package.digest == DIGEST_NOT_CHANGED {
            stats.unchanged += 1;
            continue;
        }
        if !bypass_digest_check && registered.get(key) == Some(&package.digest) {
            stats.unchanged += 1;
            continue;
        }
        if should_ignore_package(metadata, &key.name, &key.version) {
            stats.ignored += 1;
            continue;
        }
        let store_logo = newest.get(key.name.as_str()) == Some(&key.version.as_str());
        plan.register.push(Job::Register {
            package: package.clone(),
            store_logo,
        });
        stats.registered += 1;
    }

    if !available.is_empty() {
        let mut registered_keys: Vec<&PackageKey> = registered.keys().collect();
        registered_keys.sort();
        for key in registered_keys {
            if !available.contains_key(key)
                || should_ignore_package(metadata, &key.name, &key.version)
            {
                plan.unregister.push(Job::Unregister {
                    name: key.name.clone(),
                    version: key.version.clone(),
                });
                stats.unregistered += 1;
            }
        }
    }

    plan
}

/// Highest version of every package name. Valid semantic versions rank
/// above anything else, which is compared as plain text.
fn newest_versions(available: &AvailableIndex) -> HashMap<&str, &str> {
    let mut newest: HashMap<&str, (Option<semver::Version>, &str)> = HashMap::new();
    for key in available.keys() {
        let candidate = (semver::Version::parse(&key.version).ok(), key.version.as_str());
        let replace = newest
            .get(key.name.as_str())
            .map_or(true, |current| *current < candidate);
        if replace {
            newest.insert(key.name.as_str(), candidate);
        }
    }
    newest
        .into_iter()
        .map(|(name, (_, version))| (name, version))
        .collect()
}
