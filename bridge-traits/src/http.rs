//! HTTP Client Abstraction
//!
//! Async HTTP operations used to download chart archives, logos and
//! provenance files.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use std::collections::HashMap;
use url::Url;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

/// Outgoing request. Trackers only read, so there is no body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Attach repository credentials.
    pub fn basic_auth(self, user: impl AsRef<str>, pass: impl AsRef<str>) -> Self {
        let raw = format!("{}:{}", user.as_ref(), pass.as_ref());
        self.header("Authorization", format!("Basic {}", STANDARD.encode(raw)))
    }

    /// Normalized host of the request URL (lowercase, IPv6 in brackets), or
    /// `None` when the URL does not parse or has no host.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()?
            .host_str()
            .map(str::to_string)
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Async HTTP client trait
///
/// Implementations own retries, TLS and connection pooling. Non-2xx
/// statuses are returned as responses, not errors.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest, HttpMethod};
///
/// async fn fetch_chart(client: &dyn HttpClient) -> Result<Bytes> {
///     let request = HttpRequest::new(HttpMethod::Get, "https://charts.example.com/app-1.0.0.tgz")
///         .basic_auth("user", "pass");
///     Ok(client.execute(request).await?.body)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// # Errors
    ///
    /// Returns error if the request could not be completed (connection,
    /// TLS, timeout), after the implementation's own retries.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}
