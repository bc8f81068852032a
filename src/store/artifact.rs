//! Artifact descriptors and content fingerprinting.
//!
//! An artifact is one named unit of generated content inside the store:
//! a creation or deletion script, an infrastructure template, the variable
//! store, or a manifest. The fingerprint of the content the generator last
//! wrote is what distinguishes generator-owned files from user-owned ones.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// The kind of a generated artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Executable creation script (jumpbox, director).
    CreateScript,
    /// Executable deletion script.
    DeleteScript,
    /// Infrastructure template consumed by the provisioning collaborator.
    InfraTemplate,
    /// Write-once key-value variable store.
    VarsStore,
    /// Structured manifest (base cloud configuration).
    Manifest,
}

/// A named unit of generated content.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Logical name, stable across regenerations.
    pub name: String,
    /// Path relative to the store root.
    pub rel_path: PathBuf,
    /// Desired content as computed by the generator.
    pub content: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
}

impl Artifact {
    /// Creates a new artifact descriptor.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        rel_path: impl Into<PathBuf>,
        content: impl Into<String>,
        kind: ArtifactKind,
    ) -> Self {
        Self {
            name: name.into(),
            rel_path: rel_path.into(),
            content: content.into(),
            kind,
        }
    }

    /// Returns true if the on-disk file should carry execute permissions.
    #[must_use]
    pub const fn is_executable(&self) -> bool {
        matches!(self.kind, ArtifactKind::CreateScript | ArtifactKind::DeleteScript)
    }

    /// Returns the fingerprint of the desired content.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.content)
    }

    /// Returns the absolute path of this artifact under the given root.
    #[must_use]
    pub fn path_under(&self, root: &Path) -> PathBuf {
        root.join(&self.rel_path)
    }
}

/// Computes the hex SHA-256 fingerprint of artifact content.
#[must_use]
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::CreateScript => "create-script",
            Self::DeleteScript => "delete-script",
            Self::InfraTemplate => "infra-template",
            Self::VarsStore => "vars-store",
            Self::Manifest => "manifest",
        };
        write!(f, "{kind}")
    }
}
