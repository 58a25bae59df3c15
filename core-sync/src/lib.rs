//! # Catalog Tracking
//!
//! Keeps the package catalog in sync with the repositories it indexes.
//!
//! ## Overview
//!
//! For every selected repository a tracker compares the package versions the
//! repository currently offers with the ones registered in the catalog, then
//! registers what is new or changed and unregisters what disappeared.
//! Per-artifact problems never abort a run; they are collected per
//! repository and persisted once at the end.
//!
//! ## Components
//!
//! - **Sync Coordinator** (`coordinator`): selects repositories and fans trackers out
//! - **Tracker** (`tracker`): per repository state machine and diff
//! - **Sources** (`source`): discovery of available package versions per kind
//! - **Worker Pool** (`worker`): bounded executor for Helm register/unregister jobs
//! - **Rate Limiter** (`rate_limiter`): shared budget for rate limited hosts
//! - **Errors Collector** (`errors_collector`): per repository error sink
//! - **Acquisition** (`acquire`): clone or export repository content
//! - **Ignore Rules** (`ignore`): versions excluded by the repository owner

pub mod acquire;
pub mod coordinator;
pub mod error;
pub mod errors_collector;
pub mod ignore;
pub mod rate_limiter;
pub mod services;
pub mod source;
pub mod tracker;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use acquire::{acquire_content, AcquireMethod, AcquiredContent, ScratchDir};
pub use coordinator::{cancel_on_shutdown_signal, RunSummary, SyncCoordinator};
pub use error::{Result, SyncError};
pub use errors_collector::{ErrorsCollector, MAX_ERRORS_PER_REPOSITORY};
pub use ignore::{matches_entry, should_ignore_package};
pub use rate_limiter::RateLimiter;
pub use services::{TrackerServices, TrackerServicesBuilder};
pub use source::{
    compute_digest, normalize_version, HelmJobHandler, SourceInput, SourceVariant, TrackerSource,
};
pub use tracker::{plan_jobs, JobPlan, Tracker, TrackerState, TrackingStats};
pub use worker::{Job, JobHandler, JobQueue, WorkerPool};
