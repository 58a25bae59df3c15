//! Falco rules published with the legacy security hub layout, where every
//! YAML file describes one package.

use super::generic::{list_subdirs, relative};
use super::SourceInput;
use crate::error::{Result, SyncError};
use bridge_traits::AvailableIndex;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

pub struct LegacyFalcoSource {
    input: SourceInput,
}

impl LegacyFalcoSource {
    pub fn new(input: SourceInput) -> Self {
        Self { input }
    }

    #[instrument(skip(self), fields(repository = %self.input.repository.name))]
    pub async fn packages_available(&self) -> Result<AvailableIndex> {
        let base_path = self.input.base_path.as_deref().ok_or_else(|| {
            SyncError::Discovery("repository content has not been acquired".to_string())
        })?;

        let files = collect_yaml_files(base_path)
            .await
            .map_err(|e| SyncError::Discovery(format!("error reading repository content: {}", e)))?;

        let mut available = AvailableIndex::new();
        for file in files {
            self.input.check_cancelled()?;

            match self
                .input
                .services
                .artifact_parser
                .parse_package_file(&self.input.repository, &file)
                .await
            {
                Ok(package) => {
                    let package = self.input.finalize(package);
                    debug!(package = %package.name, version = %package.version, "Package found");
                    available.insert(package.key(), package);
                }
                Err(e) => self.input.warn(format!(
                    "error preparing package: {} (path: {})",
                    e,
                    relative(base_path, &file).display()
                )),
            }
        }

        Ok(available)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Every YAML file below `base`, in path order.
async fn collect_yaml_files(base: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![base.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && is_yaml(&path) {
                files.push(path);
            }
        }
        pending.extend(list_subdirs(&dir).await?);
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yaml() {
        assert!(is_yaml(Path::new("rules/nginx.yaml")));
        assert!(is_yaml(Path::new("rules/nginx.yml")));
        assert!(!is_yaml(Path::new("rules/README.md")));
        assert!(!is_yaml(Path::new("rules/yaml")));
    }

    #[tokio::test]
    async fn test_collect_yaml_files_recurses_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        std::fs::create_dir_all(base.join("a/b")).unwrap();
        std::fs::create_dir_all(base.join(".git")).unwrap();
        std::fs::write(base.join("top.yaml"), "").unwrap();
        std::fs::write(base.join("a/b/deep.yml"), "").unwrap();
        std::fs::write(base.join("a/notes.txt"), "").unwrap();
        std::fs::write(base.join(".git/config.yaml"), "").unwrap();

        let files = collect_yaml_files(base).await.unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|f| relative(base, f).to_string_lossy().to_string())
            .collect();
        assert_eq!(rel, vec!["a/b/deep.yml", "top.yaml"]);
    }
}
