//! Directory based source: one package version per directory holding a
//! package metadata file.

use super::SourceInput;
use crate::error::{Result, SyncError};
use bridge_traits::AvailableIndex;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

pub struct GenericSource {
    input: SourceInput,
}

impl GenericSource {
    pub fn new(input: SourceInput) -> Self {
        Self { input }
    }

    #[instrument(skip(self), fields(repository = %self.input.repository.name))]
    pub async fn packages_available(&self) -> Result<AvailableIndex> {
        let base_path = self.input.base_path.as_deref().ok_or_else(|| {
            SyncError::Discovery("repository content has not been acquired".to_string())
        })?;

        tokio::fs::read_dir(base_path).await.map_err(|e| {
            SyncError::Discovery(format!("error reading repository content: {}", e))
        })?;

        let mut available = AvailableIndex::new();
        let mut pending = vec![base_path.to_path_buf()];

        while let Some(dir) = pending.pop() {
            self.input.check_cancelled()?;

            match self
                .input
                .services
                .artifact_parser
                .parse_package_dir(&self.input.repository, &dir)
                .await
            {
                Ok(Some(package)) => {
                    let package = self.input.finalize(package);
                    debug!(package = %package.name, version = %package.version, "Package found");
                    available.insert(package.key(), package);
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    self.input.warn(format!(
                        "error preparing package: {} (path: {})",
                        e,
                        relative(base_path, &dir).display()
                    ));
                    continue;
                }
            }

            let subdirs = match list_subdirs(&dir).await {
                Ok(subdirs) => subdirs,
                Err(e) => {
                    self.input.warn(format!(
                        "error reading directory: {} (path: {})",
                        e,
                        relative(base_path, &dir).display()
                    ));
                    continue;
                }
            };
            // Reversed so that directories are visited in name order
            pending.extend(subdirs.into_iter().rev());
        }

        Ok(available)
    }
}

/// Visible subdirectories, sorted by name.
pub(super) async fn list_subdirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut subdirs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type().await?.is_dir() {
            subdirs.push(entry.path());
        }
    }
    subdirs.sort();
    Ok(subdirs)
}

pub(super) fn relative<'a>(base: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(base).unwrap_or(path)
}
