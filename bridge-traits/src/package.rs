//! Package Persistence Contract

use async_trait::async_trait;

use crate::catalog::Package;
use crate::error::Result;

/// Idempotent writes of package versions into the catalog.
#[async_trait]
pub trait PackageManager: Send + Sync {
    async fn register(&self, package: &Package) -> Result<()>;

    async fn unregister(&self, name: &str, version: &str, repository_id: &str) -> Result<()>;
}
