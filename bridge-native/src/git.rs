//! Repository Cloner using the `git` CLI
//!
//! Repository URLs on the well known forges may point into a subdirectory of
//! the repository (`https://github.com/org/repo/path/to/packages`). Only the
//! repository part is cloned; the rest becomes the packages path.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    repository::{ClonedRepository, RepositoryCloner},
    Repository,
};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, instrument, warn};
use url::Url;

const FORGE_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org"];

/// Shallow clones into a fresh directory below `base_dir`.
pub struct GitCloner {
    base_dir: PathBuf,
}

impl GitCloner {
    /// Clone into the system temporary directory
    pub fn new() -> Self {
        Self::with_base_dir(std::env::temp_dir())
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    async fn run_git(&self, clone_url: &Url, branch: Option<&str>, target: &Path) -> Result<()> {
        let mut command = Command::new("git");
        command
            .arg("clone")
            .arg("--depth=1")
            .arg("--single-branch");
        if let Some(branch) = branch.filter(|b| !b.is_empty()) {
            command.arg("--branch").arg(branch);
        }
        command
            .arg(clone_url.as_str())
            .arg(target)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);

        let output = command.output().await.map_err(|e| {
            BridgeError::OperationFailed(format!("error running git: {}", e))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::OperationFailed(format!(
                "error cloning repository: {}",
                redact_credentials(stderr.trim(), clone_url)
            )));
        }
        Ok(())
    }
}

impl Default for GitCloner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RepositoryCloner for GitCloner {
    #[instrument(skip(self, repository), fields(repository = %repository.name))]
    async fn clone_repository(&self, repository: &Repository) -> Result<ClonedRepository> {
        let (mut clone_url, packages_path) = split_repository_url(&repository.url)?;
        if let (Some(user), Some(pass)) = (&repository.auth_user, &repository.auth_pass) {
            // Url setters only fail for URLs that cannot carry credentials
            if clone_url.set_username(user).is_err() || clone_url.set_password(Some(pass)).is_err() {
                warn!("Repository URL cannot carry credentials, cloning anonymously");
            }
        }

        let tmp_dir = self
            .base_dir
            .join(format!("tracker-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&tmp_dir).await?;

        debug!(path = %tmp_dir.display(), "Cloning repository");
        if let Err(e) = self
            .run_git(&clone_url, repository.branch.as_deref(), &tmp_dir)
            .await
        {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&tmp_dir).await {
                warn!(error = %cleanup, "Error removing clone directory");
            }
            return Err(e);
        }

        Ok(ClonedRepository {
            packages_path: tmp_dir.join(packages_path),
            tmp_dir,
        })
    }
}

/// Split a repository URL into the URL to clone and the packages path
/// inside the clone.
pub fn split_repository_url(raw: &str) -> Result<(Url, PathBuf)> {
    let mut url = Url::parse(raw)
        .map_err(|e| BridgeError::OperationFailed(format!("invalid repository url: {}", e)))?;
    let is_forge = url
        .host_str()
        .map(|host| FORGE_HOSTS.contains(&host))
        .unwrap_or(false);
    if !is_forge {
        return Ok((url, PathBuf::new()));
    }

    let segments: Vec<String> = url
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if segments.len() < 2 {
        return Err(BridgeError::OperationFailed("invalid repository url".to_string()));
    }

    url.set_path(&format!("{}/{}", segments[0], segments[1]));
    let packages_path: PathBuf = segments[2..].iter().collect();
    Ok((url, packages_path))
}

fn redact_credentials(message: &str, url: &Url) -> String {
    match url.password() {
        Some(password) if !password.is_empty() => message.replace(password, "[REDACTED]"),
        _ => message.to_string(),
    }
}
