//! # Native Bridge Implementations
//!
//! Default implementations of bridge traits for server deployments.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with retry and exponential backoff
//! - `RepositoryCloner` using the `git` command line client
//!
//! Catalog storage, artifact parsing and image storage stay with the
//! embedding service.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_native::{GitCloner, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let services = TrackerServices::builder(config.clone())
//!     .http_client(Arc::new(ReqwestHttpClient::with_timeout(config.http_timeout)?))
//!     .repository_cloner(Arc::new(GitCloner::new()))
//!     // ...
//!     .build()?;
//! ```

mod git;
mod http;

pub use git::{split_repository_url, GitCloner};
pub use http::{ReqwestHttpClient, RetryPolicy};
