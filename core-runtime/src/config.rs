//! # Tracker Configuration
//!
//! Settings shared by every component of a tracking run.
//!
//! ## Overview
//!
//! Configuration is assembled with [`TrackerConfigBuilder`] and validated once
//! in [`TrackerConfigBuilder::build`], so a bad value stops the process before
//! any repository is touched. The same settings can be loaded from a JSON
//! document with [`TrackerConfig::from_json_str`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::TrackerConfig;
//! use std::time::Duration;
//!
//! let config = TrackerConfig::builder()
//!     .concurrency(4)
//!     .num_workers(25)
//!     .repositories_kinds(["helm", "olm"])
//!     .rate_limit(1000, Duration::from_secs(3600))
//!     .build()?;
//! ```
//!
//! ```ignore
//! let config = TrackerConfig::from_json_str(r#"{
//!     "concurrency": 2,
//!     "bypassDigestCheck": true,
//!     "repositoriesNames": ["bitnami"]
//! }"#)?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::RepositoryKind;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_NUM_WORKERS: usize = 25;
pub const DEFAULT_RATE_LIMIT_CAPACITY: u32 = 1000;
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(3600);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Validated tracker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Repositories tracked at the same time.
    pub concurrency: usize,

    /// Workers per repository for sources that fan out network work.
    pub num_workers: usize,

    /// Re-register every package version even when digests match.
    pub bypass_digest_check: bool,

    /// Only track these repositories.
    pub repositories_names: Vec<String>,

    /// Only track repositories of these kinds.
    pub repositories_kinds: Vec<RepositoryKind>,

    pub rate_limit: RateLimitConfig,

    /// Timeout applied by the HTTP client to each request.
    pub http_timeout: Duration,
}

/// Quota shared by every request sent to a rate limited host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub capacity: u32,
    pub window: Duration,
    pub hosts: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RATE_LIMIT_CAPACITY,
            window: DEFAULT_RATE_LIMIT_WINDOW,
            hosts: vec!["github.com".to_string()],
        }
    }
}

impl RateLimitConfig {
    pub fn is_limited_host(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            num_workers: DEFAULT_NUM_WORKERS,
            bypass_digest_check: false,
            repositories_names: Vec::new(),
            repositories_kinds: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl TrackerConfig {
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::default()
    }

    /// Load settings from JSON; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawTrackerConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid tracker configuration: {}", e)))?;
        raw.into_builder().build()
    }
}

/// Builder for [`TrackerConfig`].
#[derive(Debug, Default)]
pub struct TrackerConfigBuilder {
    concurrency: Option<usize>,
    num_workers: Option<usize>,
    bypass_digest_check: bool,
    repositories_names: Vec<String>,
    repositories_kinds: Vec<String>,
    rate_limit_capacity: Option<u32>,
    rate_limit_window: Option<Duration>,
    rate_limited_hosts: Option<Vec<String>>,
    http_timeout: Option<Duration>,
}

impl TrackerConfigBuilder {
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = Some(num_workers);
        self
    }

    pub fn bypass_digest_check(mut self, bypass: bool) -> Self {
        self.bypass_digest_check = bypass;
        self
    }

    pub fn repositories_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.repositories_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Kind names as used in configuration files (`helm`, `tekton-task`, ...).
    pub fn repositories_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.repositories_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    pub fn rate_limit(mut self, capacity: u32, window: Duration) -> Self {
        self.rate_limit_capacity = Some(capacity);
        self.rate_limit_window = Some(window);
        self
    }

    pub fn rate_limited_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rate_limited_hosts = Some(hosts.into_iter().map(Into::into).collect());
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a numeric setting is zero, a kind name is
    /// unknown, or both repository names and kinds are given.
    pub fn build(self) -> Result<TrackerConfig> {
        let concurrency = self.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }

        let num_workers = self.num_workers.unwrap_or(DEFAULT_NUM_WORKERS);
        if num_workers == 0 {
            return Err(Error::Config("num_workers must be at least 1".to_string()));
        }

        if !self.repositories_names.is_empty() && !self.repositories_kinds.is_empty() {
            return Err(Error::Config(
                "repositories_names and repositories_kinds cannot be combined".to_string(),
            ));
        }

        let repositories_kinds = self
            .repositories_kinds
            .iter()
            .map(|name| {
                name.parse::<RepositoryKind>().map_err(|_| {
                    Error::Config(format!("invalid repository kind found in config: {}", name))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            capacity: self.rate_limit_capacity.unwrap_or(defaults.capacity),
            window: self.rate_limit_window.unwrap_or(defaults.window),
            hosts: self.rate_limited_hosts.unwrap_or(defaults.hosts),
        };
        if rate_limit.capacity == 0 {
            return Err(Error::Config("rate limit capacity must be at least 1".to_string()));
        }
        if rate_limit.window.is_zero() {
            return Err(Error::Config("rate limit window must not be zero".to_string()));
        }

        let http_timeout = self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT);
        if http_timeout.is_zero() {
            return Err(Error::Config("http timeout must not be zero".to_string()));
        }

        Ok(TrackerConfig {
            concurrency,
            num_workers,
            bypass_digest_check: self.bypass_digest_check,
            repositories_names: self.repositories_names,
            repositories_kinds,
            rate_limit,
            http_timeout,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawTrackerConfig {
    concurrency: Option<usize>,
    num_workers: Option<usize>,
    #[serde(default)]
    bypass_digest_check: bool,
    #[serde(default)]
    repositories_names: Vec<String>,
    #[serde(default)]
    repositories_kinds: Vec<String>,
    rate_limit: Option<RawRateLimit>,
    http_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawRateLimit {
    capacity: Option<u32>,
    window_secs: Option<u64>,
    hosts: Option<Vec<String>>,
}

impl RawTrackerConfig {
    fn into_builder(self) -> TrackerConfigBuilder {
        let mut builder = TrackerConfig::builder()
            .bypass_digest_check(self.bypass_digest_check)
            .repositories_names(self.repositories_names)
            .repositories_kinds(self.repositories_kinds);
        if let Some(concurrency) = self.concurrency {
            builder = builder.concurrency(concurrency);
        }
        if let Some(num_workers) = self.num_workers {
            builder = builder.num_workers(num_workers);
        }
        if let Some(rate_limit) = self.rate_limit {
            builder.rate_limit_capacity = rate_limit.capacity;
            builder.rate_limit_window = rate_limit.window_secs.map(Duration::from_secs);
            builder.rate_limited_hosts = rate_limit.hosts;
        }
        if let Some(secs) = self.http_timeout_secs {
            builder = builder.http_timeout(Duration::from_secs(secs));
        }
        builder
    }
}
