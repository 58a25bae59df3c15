//! # Rate Limiter
//!
//! Token bucket shared by every request sent to a rate limited host.
//!
//! One instance is built per process and handed out through `Arc`, so the
//! quota holds across repositories and workers alike. Waiting is cooperative:
//! a cancelled run stops waiting immediately.

use crate::error::{Result, SyncError};
use bridge_traits::{HttpClient, HttpRequest, HttpResponse};
use core_runtime::RateLimitConfig;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct Bucket {
    tokens: u32,
    window_start: Instant,
}

/// Fixed window token bucket.
pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    hosts: Vec<String>,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration, hosts: Vec<String>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window,
            hosts,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                window_start: Instant::now(),
            }),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.capacity, config.window, config.hosts.clone())
    }

    /// Whether requests to this URL count against the quota.
    pub fn applies_to(&self, request: &HttpRequest) -> bool {
        request
            .host()
            .map(|host| self.hosts.iter().any(|h| h.eq_ignore_ascii_case(&host)))
            .unwrap_or(false)
    }

    /// Take one token, waiting for the next window when the bucket is empty.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if the token is cancelled while waiting.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let wait = match self.try_take() {
                None => return Ok(()),
                Some(wait) => wait,
            };

            debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            tokio::select! {
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Execute a request, taking a token first when the host is limited.
    pub async fn execute(
        &self,
        http_client: &dyn HttpClient,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        if self.applies_to(&request) {
            self.acquire(cancel).await?;
        }
        Ok(http_client.execute(request).await?)
    }

    /// Returns `None` when a token was taken, or how long until the refill.
    fn try_take(&self) -> Option<Duration> {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.window_start);
        if elapsed >= self.window {
            bucket.tokens = self.capacity;
            bucket.window_start = now;
        }
        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            None
        } else {
            Some(self.window.saturating_sub(elapsed))
        }
    }
}
