//! Image Storage Contract

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Stores logos and screenshots referenced by packages.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store the raw image and return its identifier.
    async fn save_image(&self, data: Bytes) -> Result<String>;
}
