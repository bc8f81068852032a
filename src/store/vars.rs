//! Write-once variable store.
//!
//! The vars file holds generated secrets and derived values. Keys are
//! written at first generation and stay stable across replans, so
//! re-running the plan never invalidates credentials already issued. The
//! external director tool appends its own variables to the same file; the
//! pipelines only read it.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{PlinthError, Result, StoreError};

use super::artifact::{Artifact, ArtifactKind};
use super::store::ArtifactStore;

/// Relative directory holding variable files inside the store.
pub const VARS_DIR: &str = "vars";

/// Logical name of the vars artifact.
const VARS_ARTIFACT_NAME: &str = "vars-store";

/// The key seeded at first generation.
const DIRECTOR_UUID_KEY: &str = "director_uuid";

/// Handle to the environment's variable store file.
#[derive(Debug, Clone)]
pub struct VarsStore {
    /// Store the vars file lives in.
    store: ArtifactStore,
    /// Store-relative path of the vars file.
    rel_path: PathBuf,
}

impl VarsStore {
    /// Returns the store-relative path for an environment's vars file.
    #[must_use]
    pub fn rel_path(env_id: &str) -> PathBuf {
        PathBuf::from(VARS_DIR).join(format!("{env_id}-variables.yml"))
    }

    /// Creates a handle for the given store root and environment.
    #[must_use]
    pub fn new(store_root: &Path, env_id: &str) -> Self {
        Self {
            store: ArtifactStore::new(store_root),
            rel_path: Self::rel_path(env_id),
        }
    }

    /// Returns the absolute path of the vars file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.store.path(&self.rel_path)
    }

    /// Seeds the vars file with its initial values if it does not exist.
    ///
    /// Returns `true` if the file was created. An existing file is never
    /// rewritten, whatever its content.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unwritable`] if the file cannot be created.
    pub async fn ensure_seeded(&self) -> Result<bool> {
        if self.path().exists() {
            debug!("Vars store already seeded: {}", self.path().display());
            return Ok(false);
        }

        let mut mapping = Mapping::new();
        mapping.insert(
            Value::String(String::from(DIRECTOR_UUID_KEY)),
            Value::String(Uuid::new_v4().to_string()),
        );

        let content = serde_yaml::to_string(&Value::Mapping(mapping))
            .map_err(|e| PlinthError::Store(StoreError::serialization(e.to_string())))?;

        let artifact = Artifact::new(
            VARS_ARTIFACT_NAME,
            self.rel_path.clone(),
            content,
            ArtifactKind::VarsStore,
        );
        self.store.write_atomic(&artifact).await?;

        info!("Seeded vars store: {}", self.path().display());
        Ok(true)
    }

    /// Reads all scalar values from the vars file.
    ///
    /// Returns an empty map if the file does not exist. Nested values are
    /// flattened one level with a `.` separator (`jumpbox_ssh.private_key`),
    /// matching how the director tool nests generated credentials.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] if the file cannot be parsed.
    pub async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&path).await.map_err(|e| {
            PlinthError::Store(StoreError::corrupted(format!(
                "Failed to read vars store: {e}"
            )))
        })?;

        let doc: Value = serde_yaml::from_str(&content).map_err(|e| {
            PlinthError::Store(StoreError::corrupted(format!(
                "Failed to parse vars store: {e}"
            )))
        })?;

        let mut values = BTreeMap::new();
        if let Value::Mapping(mapping) = doc {
            for (key, value) in mapping {
                let Value::String(key) = key else { continue };
                match value {
                    Value::String(s) => {
                        values.insert(key, s);
                    }
                    Value::Number(n) => {
                        values.insert(key, n.to_string());
                    }
                    Value::Mapping(nested) => {
                        for (nk, nv) in nested {
                            if let (Value::String(nk), Value::String(nv)) = (nk, nv) {
                                values.insert(format!("{key}.{nk}"), nv);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(values)
    }

    /// Reads one value by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the vars file exists but cannot be parsed.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }
}
