//! Catalog Data Model
//!
//! Repositories, packages and the keys used to compare what a repository
//! offers against what the catalog already holds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{BridgeError, Result};

/// Prefix identifying repositories served from an OCI registry.
pub const OCI_PREFIX: &str = "oci://";

/// Name of the metadata file a repository may publish at its root.
pub const REPOSITORY_METADATA_FILE: &str = "artifacthub-repo.yml";

/// Digest marker for packages a source knows are unchanged without
/// computing their real digest.
pub const DIGEST_NOT_CHANGED: &str = "?";

/// Supported repository ecosystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepositoryKind {
    #[serde(rename = "helm")]
    Helm,
    #[serde(rename = "falco")]
    Falco,
    #[serde(rename = "opa")]
    Opa,
    #[serde(rename = "olm")]
    Olm,
    #[serde(rename = "tbaction")]
    TbAction,
    #[serde(rename = "krew")]
    Krew,
    #[serde(rename = "helm-plugin")]
    HelmPlugin,
    #[serde(rename = "tekton-task")]
    TektonTask,
    #[serde(rename = "keda-scaler")]
    KedaScaler,
    #[serde(rename = "coredns")]
    CoreDns,
    #[serde(rename = "keptn")]
    Keptn,
    #[serde(rename = "tekton-pipeline")]
    TektonPipeline,
    #[serde(rename = "container")]
    Container,
    #[serde(rename = "kubewarden")]
    Kubewarden,
    #[serde(rename = "gatekeeper")]
    Gatekeeper,
    #[serde(rename = "kyverno")]
    Kyverno,
    #[serde(rename = "knative-client-plugin")]
    KnativeClientPlugin,
    #[serde(rename = "backstage")]
    Backstage,
    #[serde(rename = "argo-template")]
    ArgoTemplate,
    #[serde(rename = "kubearmor")]
    KubeArmor,
    #[serde(rename = "kcl")]
    Kcl,
    #[serde(rename = "headlamp")]
    Headlamp,
    #[serde(rename = "inspektor-gadget")]
    InspektorGadget,
    #[serde(rename = "tekton-stepaction")]
    TektonStepAction,
    #[serde(rename = "meshery")]
    Meshery,
    #[serde(rename = "opencost")]
    OpenCost,
    #[serde(rename = "radius")]
    Radius,
}

impl RepositoryKind {
    /// Every kind, ordered by its persisted identifier.
    pub const ALL: [RepositoryKind; 27] = [
        Self::Helm,
        Self::Falco,
        Self::Opa,
        Self::Olm,
        Self::TbAction,
        Self::Krew,
        Self::HelmPlugin,
        Self::TektonTask,
        Self::KedaScaler,
        Self::CoreDns,
        Self::Keptn,
        Self::TektonPipeline,
        Self::Container,
        Self::Kubewarden,
        Self::Gatekeeper,
        Self::Kyverno,
        Self::KnativeClientPlugin,
        Self::Backstage,
        Self::ArgoTemplate,
        Self::KubeArmor,
        Self::Kcl,
        Self::Headlamp,
        Self::InspektorGadget,
        Self::TektonStepAction,
        Self::Meshery,
        Self::OpenCost,
        Self::Radius,
    ];

    /// Identifier used by the persistence layer.
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Stable name used in configuration and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Helm => "helm",
            Self::Falco => "falco",
            Self::Opa => "opa",
            Self::Olm => "olm",
            Self::TbAction => "tbaction",
            Self::Krew => "krew",
            Self::HelmPlugin => "helm-plugin",
            Self::TektonTask => "tekton-task",
            Self::KedaScaler => "keda-scaler",
            Self::CoreDns => "coredns",
            Self::Keptn => "keptn",
            Self::TektonPipeline => "tekton-pipeline",
            Self::Container => "container",
            Self::Kubewarden => "kubewarden",
            Self::Gatekeeper => "gatekeeper",
            Self::Kyverno => "kyverno",
            Self::KnativeClientPlugin => "knative-client-plugin",
            Self::Backstage => "backstage",
            Self::ArgoTemplate => "argo-template",
            Self::KubeArmor => "kubearmor",
            Self::Kcl => "kcl",
            Self::Headlamp => "headlamp",
            Self::InspektorGadget => "inspektor-gadget",
            Self::TektonStepAction => "tekton-stepaction",
            Self::Meshery => "meshery",
            Self::OpenCost => "opencost",
            Self::Radius => "radius",
        }
    }
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RepositoryKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| BridgeError::InvalidKind(s.to_string()))
    }
}

/// A repository registered in the catalog.
#[derive(Clone, Serialize, Deserialize)]
pub struct Repository {
    pub repository_id: String,
    pub name: String,
    pub kind: RepositoryKind,
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub auth_user: Option<String>,
    #[serde(default)]
    pub auth_pass: Option<String>,
    /// Last remote digest committed for this repository.
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub verified_publisher: bool,
    #[serde(default)]
    pub disabled: bool,
    /// Kind specific settings (container repositories list their tags here).
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl Repository {
    pub fn new(
        repository_id: impl Into<String>,
        name: impl Into<String>,
        kind: RepositoryKind,
        url: impl Into<String>,
    ) -> Self {
        Self {
            repository_id: repository_id.into(),
            name: name.into(),
            kind,
            url: url.into(),
            branch: None,
            auth_user: None,
            auth_pass: None,
            digest: None,
            verified_publisher: false,
            disabled: false,
            data: None,
        }
    }

    pub fn is_oci(&self) -> bool {
        self.url.starts_with(OCI_PREFIX)
    }

    /// Stored digest, treating an empty string as absent.
    pub fn stored_digest(&self) -> Option<&str> {
        self.digest.as_deref().filter(|d| !d.is_empty())
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("repository_id", &self.repository_id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("branch", &self.branch)
            .field("auth_user", &self.auth_user.as_ref().map(|_| "[REDACTED]"))
            .field("auth_pass", &self.auth_pass.as_ref().map(|_| "[REDACTED]"))
            .field("digest", &self.digest)
            .field("verified_publisher", &self.verified_publisher)
            .field("disabled", &self.disabled)
            .finish()
    }
}

/// Tags tracked for a container image repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerImageData {
    #[serde(default)]
    pub tags: Vec<ContainerImageTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerImageTag {
    pub name: String,
    /// Mutable tags are re-processed on every run.
    #[serde(default)]
    pub mutable: bool,
}

/// Metadata file published by a repository owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    #[serde(rename = "repositoryID", default)]
    pub repository_id: String,
    #[serde(default)]
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub ignore: Vec<IgnoreEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
}

/// Excludes package versions from the catalog.
///
/// `name` must match exactly, `version` is a regular expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreEntry {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub url: String,
}

/// A single package version offered by a repository.
///
/// Everything except `name`, `version` and `digest` is carried through to the
/// package manager untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub repository_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub logo_image_id: Option<String>,
    #[serde(default)]
    pub home_url: Option<String>,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub readme: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub is_operator: bool,
    #[serde(default)]
    pub capabilities: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl Package {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.name, &self.version)
    }
}

/// Identity of a package version within one repository.
///
/// Displays as `name@version`, the format used by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
}

impl PackageKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl FromStr for PackageKey {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('@') {
            Some((name, version)) if !name.is_empty() => Ok(Self::new(name, version)),
            _ => Err(BridgeError::InvalidKey(s.to_string())),
        }
    }
}

/// Digests of the package versions already in the catalog.
pub type RegisteredIndex = HashMap<PackageKey, String>;

/// Package versions currently offered by a repository.
pub type AvailableIndex = HashMap<PackageKey, Package>;
