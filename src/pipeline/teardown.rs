//! The teardown pipeline.
//!
//! Reverses the apply order: delete the director, delete the jumpbox,
//! destroy the network. The same run-what-is-on-disk policy applies, so
//! an operator (or a test harness) can substitute no-op deletion scripts.
//! Every step tolerates "already deleted" as success; re-running after a
//! partial failure is always safe.

use tracing::info;

use crate::error::Result;
use crate::plan::templates::names;
use crate::store::{ArtifactStore, Phase, StateFile, VarsStore};

use super::apply::steps;
use super::script::ScriptRunner;
use super::terraform::{InfraProvisioner, ProvisionRequest};

/// Result of a completed teardown run.
#[derive(Debug)]
pub struct TeardownReport {
    /// Environment that was destroyed.
    pub env_id: String,
}

/// Executes the ordered teardown steps against an artifact store.
pub struct TeardownPipeline<P: InfraProvisioner> {
    store: ArtifactStore,
    provisioner: P,
}

impl<P: InfraProvisioner> TeardownPipeline<P> {
    /// Creates a pipeline over the given store and provisioner.
    #[must_use]
    pub const fn new(store: ArtifactStore, provisioner: P) -> Self {
        Self { store, provisioner }
    }

    /// Runs the pipeline to completion.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error; state captured so far is
    /// persisted and a re-run is expected to finish the job. The record is
    /// kept on disk with phase destroyed as an archive of the environment.
    pub async fn run(&self) -> Result<TeardownReport> {
        let state_file = StateFile::new(self.store.root());
        let mut state = state_file.load_required().await?;
        state.require_down_allowed()?;

        let vars = VarsStore::new(self.store.root(), &state.env_id);
        let runner = ScriptRunner::new(self.store.root())
            .with_env("PLINTH_STATE_DIR", self.store.root().display().to_string())
            .with_env("PLINTH_VARS_FILE", vars.path().display().to_string())
            .with_env("PLINTH_ENV_ID", state.env_id.clone());

        runner
            .run(steps::DELETE_DIRECTOR, names::DELETE_DIRECTOR, "delete-director.sh")
            .await?;
        state.director = None;
        state_file.save(&state).await?;

        runner
            .run(steps::DELETE_JUMPBOX, names::DELETE_JUMPBOX, "delete-jumpbox.sh")
            .await?;
        state.jumpbox = None;
        state_file.save(&state).await?;

        let request = ProvisionRequest {
            template_dir: self.store.path("terraform"),
            env_id: state.env_id.clone(),
            lb_cert: None,
            lb_key: None,
        };
        self.provisioner.destroy(&request).await?;
        state.outputs.clear();

        state.set_phase(Phase::Destroyed);
        state_file.save(&state).await?;

        info!("Environment '{}' destroyed", state.env_id);

        Ok(TeardownReport {
            env_id: state.env_id,
        })
    }
}
