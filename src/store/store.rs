//! The artifact store: atomic writes and the preserve-on-regenerate policy.
//!
//! Every artifact write goes through [`ArtifactStore::apply`], which
//! implements the three-way decision at the center of the system:
//!
//! 1. No file on disk: write it, fingerprint it.
//! 2. File matches its recorded fingerprint: still generator-owned,
//!    overwrite with the freshly computed content.
//! 3. File diverges from its recorded fingerprint: the operator owns it
//!    now, leave it untouched.
//!
//! Ownership transfer is one-directional; a user-owned artifact is never
//! reclaimed by regeneration.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{PlinthError, Result, StoreError};

use super::artifact::{fingerprint, Artifact};

/// The working directory holding all generated and editable files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// Store root directory.
    root: PathBuf,
}

/// Outcome of applying one artifact through the preserve policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// No file existed; the artifact was written fresh.
    Created,
    /// The file was generator-owned and has been overwritten with new content.
    Regenerated,
    /// The file was generator-owned and the new content is identical.
    Unchanged,
    /// The file was modified by the operator and has been left untouched.
    Preserved,
}

impl ArtifactStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the absolute path for a store-relative path.
    #[must_use]
    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// Ensures the store root exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unwritable`] if the directory cannot be created.
    pub async fn ensure_root(&self) -> Result<()> {
        if !self.root.exists() {
            debug!("Creating artifact store: {}", self.root.display());
            fs::create_dir_all(&self.root)
                .await
                .map_err(|e| PlinthError::Store(StoreError::unwritable(&self.root, &e)))?;
        }
        Ok(())
    }

    /// Reads the current on-disk content of a store-relative path.
    ///
    /// Returns `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn read(&self, rel: impl AsRef<Path>) -> Result<Option<String>> {
        let path = self.path(rel);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await.map_err(|e| {
            PlinthError::Store(StoreError::corrupted(format!(
                "Failed to read {}: {e}",
                path.display()
            )))
        })?;
        Ok(Some(content))
    }

    /// Applies one artifact through the three-way preserve policy.
    ///
    /// `recorded_fingerprint` is the fingerprint of the content the
    /// generator last wrote for this artifact, or `None` if it was never
    /// generated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unwritable`] if the write fails; no partial
    /// content is left behind.
    pub async fn apply(
        &self,
        artifact: &Artifact,
        recorded_fingerprint: Option<&str>,
    ) -> Result<WriteOutcome> {
        let path = artifact.path_under(&self.root);

        let Some(current) = self.read(&artifact.rel_path).await? else {
            self.write_atomic(artifact).await?;
            info!("Created artifact '{}' at {}", artifact.name, path.display());
            return Ok(WriteOutcome::Created);
        };

        let current_fp = fingerprint(&current);
        match recorded_fingerprint {
            Some(recorded) if current_fp == recorded => {
                if current == artifact.content {
                    debug!("Artifact '{}' is up to date", artifact.name);
                    Ok(WriteOutcome::Unchanged)
                } else {
                    self.write_atomic(artifact).await?;
                    info!("Regenerated artifact '{}'", artifact.name);
                    Ok(WriteOutcome::Regenerated)
                }
            }
            _ => {
                // Divergence means the operator took ownership; a file with
                // no recorded fingerprint but content on disk is treated the
                // same way rather than clobbered.
                info!("Preserving user-modified artifact '{}'", artifact.name);
                Ok(WriteOutcome::Preserved)
            }
        }
    }

    /// Writes an artifact atomically: temp file, then rename into place.
    ///
    /// Scripts are made executable. Parent directories are created on
    /// demand.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unwritable`] on any IO failure.
    pub async fn write_atomic(&self, artifact: &Artifact) -> Result<()> {
        let path = artifact.path_under(&self.root);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PlinthError::Store(StoreError::unwritable(parent, &e)))?;
        }

        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| PlinthError::Store(StoreError::unwritable(&temp_path, &e)))?;

        file.write_all(artifact.content.as_bytes())
            .await
            .map_err(|e| PlinthError::Store(StoreError::unwritable(&temp_path, &e)))?;

        file.sync_all()
            .await
            .map_err(|e| PlinthError::Store(StoreError::unwritable(&temp_path, &e)))?;

        drop(file);

        #[cfg(unix)]
        if artifact.is_executable() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(|e| PlinthError::Store(StoreError::unwritable(&temp_path, &e)))?;
        }

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| PlinthError::Store(StoreError::unwritable(&path, &e)))?;

        Ok(())
    }
}

impl std::fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let outcome = match self {
            Self::Created => "created",
            Self::Regenerated => "regenerated",
            Self::Unchanged => "unchanged",
            Self::Preserved => "preserved",
        };
        write!(f, "{outcome}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::artifact::ArtifactKind;
    use tempfile::TempDir;

    fn script(content: &str) -> Artifact {
        Artifact::new(
            "create-jumpbox",
            "create-jumpbox.sh",
            content,
            ArtifactKind::CreateScript,
        )
    }

    #[tokio::test]
    async fn test_apply_creates_missing_artifact() {
        let temp = TempDir::new().expect("temp dir");
        let store = ArtifactStore::new(temp.path());

        let artifact = script("#!/bin/sh\necho one\n");
        let outcome = store.apply(&artifact, None).await.expect("apply");

        assert_eq!(outcome, WriteOutcome::Created);
        let on_disk = store
            .read("create-jumpbox.sh")
            .await
            .expect("read")
            .expect("exists");
        assert_eq!(on_disk, "#!/bin/sh\necho one\n");
    }

    #[tokio::test]
    async fn test_apply_regenerates_owned_artifact() {
        let temp = TempDir::new().expect("temp dir");
        let store = ArtifactStore::new(temp.path());

        let v1 = script("#!/bin/sh\necho one\n");
        store.apply(&v1, None).await.expect("apply v1");

        let v2 = script("#!/bin/sh\necho two\n");
        let outcome = store
            .apply(&v2, Some(&v1.fingerprint()))
            .await
            .expect("apply v2");

        assert_eq!(outcome, WriteOutcome::Regenerated);
        let on_disk = store
            .read("create-jumpbox.sh")
            .await
            .expect("read")
            .expect("exists");
        assert_eq!(on_disk, "#!/bin/sh\necho two\n");
    }

    #[tokio::test]
    async fn test_apply_preserves_user_modified_artifact() {
        let temp = TempDir::new().expect("temp dir");
        let store = ArtifactStore::new(temp.path());

        let v1 = script("#!/bin/sh\necho one\n");
        store.apply(&v1, None).await.expect("apply v1");

        // Operator rewrites the script between plan runs.
        let edited = "#!/bin/sh\necho edited >> log\n";
        std::fs::write(temp.path().join("create-jumpbox.sh"), edited).expect("edit");

        let v2 = script("#!/bin/sh\necho two\n");
        let outcome = store
            .apply(&v2, Some(&v1.fingerprint()))
            .await
            .expect("apply v2");

        assert_eq!(outcome, WriteOutcome::Preserved);
        let on_disk = store
            .read("create-jumpbox.sh")
            .await
            .expect("read")
            .expect("exists");
        assert_eq!(on_disk, edited);
    }

    #[tokio::test]
    async fn test_apply_unchanged_when_content_identical() {
        let temp = TempDir::new().expect("temp dir");
        let store = ArtifactStore::new(temp.path());

        let v1 = script("#!/bin/sh\necho one\n");
        store.apply(&v1, None).await.expect("apply v1");

        let outcome = store
            .apply(&v1, Some(&v1.fingerprint()))
            .await
            .expect("re-apply");
        assert_eq!(outcome, WriteOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_temp_file() {
        let temp = TempDir::new().expect("temp dir");
        let store = ArtifactStore::new(temp.path());

        store
            .write_atomic(&script("#!/bin/sh\n"))
            .await
            .expect("write");

        assert!(!temp.path().join("create-jumpbox.tmp").exists());
        assert!(temp.path().join("create-jumpbox.sh").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scripts_are_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().expect("temp dir");
        let store = ArtifactStore::new(temp.path());
        store
            .write_atomic(&script("#!/bin/sh\n"))
            .await
            .expect("write");

        let mode = std::fs::metadata(temp.path().join("create-jumpbox.sh"))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
