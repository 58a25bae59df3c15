//! Container image repositories: one package version per tracked tag.

use super::SourceInput;
use crate::error::{Result, SyncError};
use bridge_traits::{AvailableIndex, ContainerImageData, Package, DIGEST_NOT_CHANGED};
use tracing::{debug, instrument};

pub struct ContainerSource {
    input: SourceInput,
}

impl ContainerSource {
    pub fn new(input: SourceInput) -> Self {
        Self { input }
    }

    /// Package name shared by every tag: the last segment of the image URL.
    fn package_name(&self) -> String {
        image_name(&self.input.repository.url).to_string()
    }

    #[instrument(skip(self), fields(repository = %self.input.repository.name))]
    pub async fn packages_available(&self) -> Result<AvailableIndex> {
        let mut available = AvailableIndex::new();

        let Some(data) = self.input.repository.data.clone() else {
            return Ok(available);
        };
        let data: ContainerImageData = serde_json::from_value(data)
            .map_err(|e| SyncError::Discovery(format!("invalid container image data: {}", e)))?;

        let name = self.package_name();
        for tag in data.tags {
            self.input.check_cancelled()?;

            let key = Package::new(&name, &tag.name).key();
            if self.input.registered.contains_key(&key) && !tag.mutable {
                let mut package = Package::new(&name, &tag.name);
                package.digest = DIGEST_NOT_CHANGED.to_string();
                package.repository_id = self.input.repository.repository_id.clone();
                available.insert(key, package);
                continue;
            }

            match self
                .input
                .services
                .artifact_parser
                .parse_container_image(&self.input.repository, &tag.name)
                .await
            {
                Ok(package) => {
                    let package = self.input.finalize(package);
                    debug!(package = %package.name, version = %package.version, "Image tag prepared");
                    available.insert(package.key(), package);
                }
                Err(e) => self.input.warn(format!(
                    "error preparing package (tag: {}): {}",
                    tag.name, e
                )),
            }
        }

        Ok(available)
    }
}

pub(super) fn image_name(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_name() {
        assert_eq!(image_name("oci://ghcr.io/org/tool"), "tool");
        assert_eq!(image_name("oci://ghcr.io/org/tool/"), "tool");
        assert_eq!(image_name("tool"), "tool");
    }
}
