use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("error getting repository remote digest: {0}")]
    RemoteDigest(#[source] BridgeError),

    #[error("error acquiring repository content: {0}")]
    Acquire(#[source] BridgeError),

    #[error("error getting repositories: {0}")]
    RepositorySelection(String),

    #[error("error getting registered packages: {0}")]
    RegisteredPackages(#[source] BridgeError),

    #[error("error getting available packages: {0}")]
    Discovery(String),

    #[error("repository index mismatch: unexpected index file received (stale copy?), will retry later")]
    IndexMismatch,

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tracking cancelled")]
    Cancelled,

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

impl From<core_runtime::Error> for SyncError {
    fn from(err: core_runtime::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
