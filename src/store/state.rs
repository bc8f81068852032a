//! The persisted environment record.
//!
//! One record per artifact store, written after every mutation so that a
//! crashed pipeline resumes from a plain re-invocation. The record carries
//! the lifecycle phase, the declared load balancers, the fingerprints of
//! generator-owned artifacts, and the structured outputs captured from the
//! provisioning step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::{Iaas, LoadBalancer};
use crate::error::{PlinthError, Result, StoreError};

/// Current version of the record format.
pub const STATE_VERSION: &str = "1";

/// Name of the record file inside the store root.
pub const STATE_FILE: &str = "state.json";

/// Lifecycle phase of an environment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No plan has been generated yet.
    Unplanned,
    /// Artifacts exist; infrastructure may or may not.
    Planned,
    /// The apply pipeline completed.
    Up,
    /// The teardown pipeline completed.
    Destroyed,
}

/// Addressing information for a provisioned host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostRecord {
    /// Reachable address (URL or IP).
    pub address: String,
}

/// The complete environment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentState {
    /// Record format version.
    pub version: String,
    /// Stable environment name.
    pub env_id: String,
    /// Target IaaS.
    pub iaas: Iaas,
    /// Lifecycle phase.
    pub phase: Phase,
    /// Declared load balancers.
    #[serde(default)]
    pub load_balancers: Vec<LoadBalancer>,
    /// Fingerprints of generator-owned artifacts, keyed by logical name.
    #[serde(default)]
    pub artifact_fingerprints: BTreeMap<String, String>,
    /// Structured outputs captured from the provisioning step.
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,
    /// Jumpbox addressing, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jumpbox: Option<HostRecord>,
    /// Director addressing, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<HostRecord>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Phase {
    /// Returns true if the apply pipeline may run from this phase.
    #[must_use]
    pub const fn allows_up(self) -> bool {
        matches!(self, Self::Planned | Self::Up)
    }

    /// Returns true if the teardown pipeline may run from this phase.
    #[must_use]
    pub const fn allows_down(self) -> bool {
        matches!(self, Self::Planned | Self::Up)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            Self::Unplanned => "unplanned",
            Self::Planned => "planned",
            Self::Up => "up",
            Self::Destroyed => "destroyed",
        };
        write!(f, "{phase}")
    }
}

impl EnvironmentState {
    /// Creates a fresh record in the unplanned phase.
    #[must_use]
    pub fn new(env_id: &str, iaas: Iaas) -> Self {
        let now = Utc::now();
        Self {
            version: STATE_VERSION.to_string(),
            env_id: env_id.to_string(),
            iaas,
            phase: Phase::Unplanned,
            load_balancers: Vec::new(),
            artifact_fingerprints: BTreeMap::new(),
            outputs: BTreeMap::new(),
            jumpbox: None,
            director: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advances the lifecycle phase.
    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.touch();
    }

    /// Records the generation fingerprint of an artifact.
    pub fn record_fingerprint(&mut self, name: &str, fp: String) {
        self.artifact_fingerprints.insert(name.to_string(), fp);
        self.touch();
    }

    /// Returns the recorded generation fingerprint for an artifact.
    #[must_use]
    pub fn fingerprint_of(&self, name: &str) -> Option<&str> {
        self.artifact_fingerprints.get(name).map(String::as_str)
    }

    /// Replaces the captured provisioning outputs.
    pub fn set_outputs(&mut self, outputs: BTreeMap<String, serde_json::Value>) {
        self.outputs = outputs;
        self.touch();
    }

    /// Returns a captured output as a string, if present.
    #[must_use]
    pub fn output_str(&self, key: &str) -> Option<String> {
        self.outputs.get(key).map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Checks that the record allows the apply pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PhaseViolation`] otherwise.
    pub fn require_up_allowed(&self) -> Result<()> {
        if self.phase.allows_up() {
            Ok(())
        } else {
            Err(PlinthError::Store(StoreError::PhaseViolation {
                env_id: self.env_id.clone(),
                required: String::from("planned or up"),
                actual: self.phase.to_string(),
            }))
        }
    }

    /// Checks that the record allows the teardown pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PhaseViolation`] otherwise.
    pub fn require_down_allowed(&self) -> Result<()> {
        if self.phase.allows_down() {
            Ok(())
        } else {
            Err(PlinthError::Store(StoreError::PhaseViolation {
                env_id: self.env_id.clone(),
                required: String::from("planned or up"),
                actual: self.phase.to_string(),
            }))
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Loads and saves the environment record atomically.
#[derive(Debug, Clone)]
pub struct StateFile {
    /// Absolute path of the record file.
    path: PathBuf,
}

impl StateFile {
    /// Creates a handle for the record inside the given store root.
    #[must_use]
    pub fn new(store_root: &Path) -> Self {
        Self {
            path: store_root.join(STATE_FILE),
        }
    }

    /// Returns the record path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a record exists on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the record.
    ///
    /// Returns `None` if no record exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] if the record cannot be parsed.
    pub async fn load(&self) -> Result<Option<EnvironmentState>> {
        if !self.path.exists() {
            debug!("No environment record at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            PlinthError::Store(StoreError::corrupted(format!(
                "Failed to read environment record: {e}"
            )))
        })?;

        let state: EnvironmentState = serde_json::from_str(&content).map_err(|e| {
            PlinthError::Store(StoreError::corrupted(format!(
                "Failed to parse environment record: {e}"
            )))
        })?;

        Ok(Some(state))
    }

    /// Loads the record, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoRecord`] if no record exists.
    pub async fn load_required(&self) -> Result<EnvironmentState> {
        self.load().await?.ok_or_else(|| {
            PlinthError::Store(StoreError::NoRecord {
                path: self
                    .path
                    .parent()
                    .map_or_else(|| self.path.clone(), Path::to_path_buf),
            })
        })
    }

    /// Saves the record atomically (temp file, then rename).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] variants on serialization or IO failure.
    pub async fn save(&self, state: &EnvironmentState) -> Result<()> {
        info!("Saving environment record: {}", self.path.display());

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| PlinthError::Store(StoreError::serialization(e.to_string())))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PlinthError::Store(StoreError::unwritable(parent, &e)))?;
        }

        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| PlinthError::Store(StoreError::unwritable(&temp_path, &e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| PlinthError::Store(StoreError::unwritable(&temp_path, &e)))?;

        file.sync_all()
            .await
            .map_err(|e| PlinthError::Store(StoreError::unwritable(&temp_path, &e)))?;

        drop(file);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| PlinthError::Store(StoreError::unwritable(&self.path, &e)))?;

        debug!("Environment record saved");
        Ok(())
    }
}
