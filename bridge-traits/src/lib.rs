//! # Catalog Bridge Traits
//!
//! Data model and collaborator contracts for the catalog tracker.
//!
//! ## Overview
//!
//! The tracker decides which package versions to add, refresh or remove; it
//! does not parse artifact formats, fetch repositories or persist anything
//! itself. This crate defines the contract between the tracker and those
//! collaborators, plus the values that flow across it.
//!
//! ## Traits
//!
//! ### Persistence
//! - [`RepositoryManager`](repository::RepositoryManager) - Repository state, digests, metadata and tracking errors
//! - [`PackageManager`](package::PackageManager) - Idempotent register / unregister
//! - [`ImageStore`](image::ImageStore) - Logo storage
//!
//! ### Content acquisition
//! - [`RepositoryCloner`](repository::RepositoryCloner) - VCS checkouts
//! - [`OciExporter`](repository::OciExporter) - OCI hosted catalogs
//! - [`HttpClient`](http::HttpClient) - Archive, logo and provenance downloads
//!
//! ### Formats
//! - [`ArtifactParser`](parser::ArtifactParser) - Directory, file and image based packages
//! - [`HelmIndexLoader`](parser::HelmIndexLoader), [`OciRegistry`](parser::OciRegistry),
//!   [`ChartArchiveParser`](parser::ChartArchiveParser) - Helm repositories
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations should convert backend specific errors into it and keep
//! the message actionable: it may end up in the tracking errors shown to the
//! repository owner.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds; the tracker shares a single
//! instance of each across every repository and worker task.

pub mod catalog;
pub mod error;
pub mod http;
pub mod image;
pub mod package;
pub mod parser;
pub mod repository;

pub use error::BridgeError;

pub use catalog::{
    AvailableIndex, ContainerImageData, ContainerImageTag, IgnoreEntry, Link, Maintainer, Owner,
    Package, PackageKey, RegisteredIndex, Repository, RepositoryKind, RepositoryMetadata,
    DIGEST_NOT_CHANGED, OCI_PREFIX, REPOSITORY_METADATA_FILE,
};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use image::ImageStore;
pub use package::PackageManager;
pub use parser::{
    ArtifactParser, ChartArchive, ChartArchiveParser, ChartMaintainer, ChartVersion, HelmIndex,
    HelmIndexLoader, OciRegistry, CHART_CONTENT_MEDIA_TYPE, CHART_PROVENANCE_MEDIA_TYPE,
};
pub use repository::{
    ClonedRepository, OciExporter, RepositoryCloner, RepositoryManager, SearchRepositoryInput,
};
