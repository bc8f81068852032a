//! The apply pipeline.
//!
//! Converges live infrastructure toward the artifact-described state in
//! five strictly sequential steps: provision the network, create the
//! jumpbox, create the director, reconcile the cloud configuration, and
//! resolve load-balancer endpoints. The environment record is persisted
//! after every step, so a failed or interrupted run resumes by plain
//! re-invocation; nothing already created is rolled back.

use tracing::{info, warn};

use crate::cloudconfig::{CloudConfigReconciler, DirectorAdapter};
use crate::config::LbType;
use crate::endpoints::{EndpointReporter, LbEndpoint};
use crate::error::{PlinthError, Result, StepError};
use crate::plan::templates::{self, names};
use crate::store::{ArtifactStore, EnvironmentState, HostRecord, Phase, StateFile, VarsStore};

use super::script::ScriptRunner;
use super::terraform::{InfraProvisioner, ProvisionRequest};

/// Pipeline step names, as they appear in errors and logs.
pub mod steps {
    /// Network provisioning step.
    pub const PROVISION_NETWORK: &str = "provision-network";
    /// Jumpbox creation step.
    pub const CREATE_JUMPBOX: &str = "create-jumpbox";
    /// Director creation step.
    pub const CREATE_DIRECTOR: &str = "create-director";
    /// Cloud configuration reconciliation step.
    pub const RECONCILE_CLOUD_CONFIG: &str = "reconcile-cloud-config";
    /// Endpoint reporting step.
    pub const REPORT_ENDPOINTS: &str = "report-endpoints";
    /// Director deletion step.
    pub const DELETE_DIRECTOR: &str = "delete-director";
    /// Jumpbox deletion step.
    pub const DELETE_JUMPBOX: &str = "delete-jumpbox";
    /// Network teardown step.
    pub const DESTROY_NETWORK: &str = "destroy-network";
}

/// Director address used when the template exposes none.
pub const DEFAULT_DIRECTOR_ADDRESS: &str = "https://10.0.0.6:25555";

/// Result of a completed apply run.
#[derive(Debug)]
pub struct ApplyReport {
    /// Resolved load-balancer endpoints.
    pub endpoints: Vec<LbEndpoint>,
    /// Whether a cloud configuration upload was performed and accepted.
    pub cloud_config_uploaded: bool,
    /// Upload rejection diagnostics, when the director refused the merge.
    pub upload_error: Option<String>,
    /// Jumpbox addressing, once known.
    pub jumpbox: Option<HostRecord>,
    /// Director addressing, once known.
    pub director: Option<HostRecord>,
}

/// Executes the ordered apply steps against an artifact store.
pub struct ApplyPipeline<P, D, F>
where
    P: InfraProvisioner,
    D: DirectorAdapter,
    F: Fn(&str) -> D,
{
    store: ArtifactStore,
    provisioner: P,
    director_factory: F,
}

impl<P, D, F> ApplyPipeline<P, D, F>
where
    P: InfraProvisioner,
    D: DirectorAdapter,
    F: Fn(&str) -> D,
{
    /// Creates a pipeline over the given store and collaborators.
    ///
    /// The director adapter is constructed lazily because the director's
    /// address is only known after the creation steps have run.
    #[must_use]
    pub const fn new(store: ArtifactStore, provisioner: P, director_factory: F) -> Self {
        Self {
            store,
            provisioner,
            director_factory,
        }
    }

    /// Runs the pipeline to completion.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error. Steps already completed are
    /// not rolled back and their captured state is persisted; the phase
    /// only advances to up after the final step.
    pub async fn run(&self) -> Result<ApplyReport> {
        let state_file = StateFile::new(self.store.root());
        let mut state = state_file.load_required().await?;
        state.require_up_allowed()?;

        let vars = VarsStore::new(self.store.root(), &state.env_id);
        let runner = ScriptRunner::new(self.store.root())
            .with_env("PLINTH_STATE_DIR", self.store.root().display().to_string())
            .with_env("PLINTH_VARS_FILE", vars.path().display().to_string())
            .with_env("PLINTH_ENV_ID", state.env_id.clone());

        // Step 1: provision the network topology and capture its outputs.
        let request = self.provision_request(&state).await?;
        let outputs = self.provisioner.apply(&request).await?;
        state.set_outputs(outputs);
        if let Some(address) = state.output_str("jumpbox_url") {
            state.jumpbox = Some(HostRecord { address });
        }
        if let Some(address) = state.output_str("director_address") {
            state.director = Some(HostRecord { address });
        }
        state_file.save(&state).await?;

        // Step 2: create the jumpbox with whatever script is on disk.
        runner
            .run(steps::CREATE_JUMPBOX, names::CREATE_JUMPBOX, "create-jumpbox.sh")
            .await?;
        state_file.save(&state).await?;

        // Step 3: create the director.
        runner
            .run(steps::CREATE_DIRECTOR, names::CREATE_DIRECTOR, "create-director.sh")
            .await?;
        if state.director.is_none() {
            state.director = Some(HostRecord {
                address: String::from(DEFAULT_DIRECTOR_ADDRESS),
            });
        }
        state_file.save(&state).await?;

        // Step 4: reconcile the cloud configuration. A rejected upload is
        // reported but does not fail the run; the operator re-runs up once
        // the director accepts uploads again.
        let outcome = self.reconcile_cloud_config(&state).await?;
        if let Some(error) = &outcome.upload_error {
            warn!("Continuing despite cloud config rejection: {error}");
        }

        // Step 5: resolve endpoints for every declared load balancer.
        let endpoints = EndpointReporter::new().resolve(&state)?;

        state.set_phase(Phase::Up);
        state_file.save(&state).await?;

        info!("Environment '{}' is up", state.env_id);

        Ok(ApplyReport {
            endpoints,
            cloud_config_uploaded: outcome.uploaded,
            upload_error: outcome.upload_error,
            jumpbox: state.jumpbox,
            director: state.director,
        })
    }

    /// Builds the provisioning request from the persisted declarations.
    async fn provision_request(&self, state: &EnvironmentState) -> Result<ProvisionRequest> {
        let mut lb_cert = None;
        let mut lb_key = None;

        for lb in &state.load_balancers {
            if let Some(cert) = &lb.cert {
                lb_cert = Some(tokio::fs::read_to_string(cert).await?);
            }
            if let Some(key) = &lb.key {
                lb_key = Some(tokio::fs::read_to_string(key).await?);
            }
        }

        Ok(ProvisionRequest {
            template_dir: self.store.path("terraform"),
            env_id: state.env_id.clone(),
            lb_cert,
            lb_key,
        })
    }

    /// Runs the cloud configuration reconciler against the director.
    async fn reconcile_cloud_config(
        &self,
        state: &EnvironmentState,
    ) -> Result<crate::cloudconfig::ReconcileOutcome> {
        let base = self
            .store
            .read(templates::CLOUD_CONFIG_BASE_PATH)
            .await?
            .ok_or_else(|| {
                PlinthError::Step(StepError::MissingArtifact {
                    step: steps::RECONCILE_CLOUD_CONFIG.to_string(),
                    name: names::CLOUD_CONFIG_BASE.to_string(),
                    path: self.store.path(templates::CLOUD_CONFIG_BASE_PATH),
                })
            })?;

        let address = state
            .director
            .as_ref()
            .map_or(DEFAULT_DIRECTOR_ADDRESS, |d| d.address.as_str());

        let lb_types: Vec<LbType> = state.load_balancers.iter().map(|lb| lb.lb_type).collect();

        let adapter = (self.director_factory)(address);
        CloudConfigReconciler::new(adapter)
            .reconcile(&base, state.iaas, &lb_types, &state.env_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudconfig::{
        CF_ROUTER_EXTENSION, CF_SSH_PROXY_EXTENSION, CF_TCP_ROUTER_EXTENSION,
    };
    use crate::config::{EnvironmentConfig, Iaas, LoadBalancer};
    use crate::error::CloudConfigError;
    use crate::pipeline::terraform::ProvisionOutputs;
    use crate::plan::PlanGenerator;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Provisioner double returning canned outputs.
    struct FakeProvisioner {
        outputs: BTreeMap<String, serde_json::Value>,
    }

    impl FakeProvisioner {
        fn with_outputs(entries: &[(&str, &str)]) -> Self {
            let mut outputs = BTreeMap::new();
            for (key, value) in entries {
                outputs.insert(
                    (*key).to_string(),
                    serde_json::Value::String((*value).to_string()),
                );
            }
            Self { outputs }
        }
    }

    #[async_trait]
    impl InfraProvisioner for FakeProvisioner {
        async fn apply(&self, _request: &ProvisionRequest) -> Result<ProvisionOutputs> {
            Ok(self.outputs.clone())
        }

        async fn destroy(&self, _request: &ProvisionRequest) -> Result<()> {
            Ok(())
        }
    }

    /// Director double shared between the factory and the assertion site.
    #[derive(Clone)]
    struct SharedDirector {
        inner: Arc<DirectorInner>,
    }

    struct DirectorInner {
        current: Mutex<Option<String>>,
        reject_upload: bool,
    }

    impl SharedDirector {
        fn new() -> Self {
            Self {
                inner: Arc::new(DirectorInner {
                    current: Mutex::new(None),
                    reject_upload: false,
                }),
            }
        }

        fn rejecting() -> Self {
            Self {
                inner: Arc::new(DirectorInner {
                    current: Mutex::new(None),
                    reject_upload: true,
                }),
            }
        }

        fn uploaded_config(&self) -> Option<String> {
            self.inner.current.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl DirectorAdapter for SharedDirector {
        async fn fetch_cloud_config(&self) -> Result<Option<String>> {
            Ok(self.inner.current.lock().expect("lock").clone())
        }

        async fn upload_cloud_config(&self, document: &str) -> Result<()> {
            if self.inner.reject_upload {
                return Err(PlinthError::CloudConfig(CloudConfigError::upload(
                    "director unreachable",
                )));
            }
            *self.inner.current.lock().expect("lock") = Some(document.to_string());
            Ok(())
        }
    }

    async fn planned_env(temp: &TempDir, with_cf: bool) -> ArtifactStore {
        let mut config = EnvironmentConfig::new("test-env", Iaas::Aws, temp.path());
        if with_cf {
            let cert = temp.path().join("lb.crt");
            let key = temp.path().join("lb.key");
            std::fs::write(&cert, "cert-material").expect("cert");
            std::fs::write(&key, "key-material").expect("key");
            config = config
                .with_load_balancer(LoadBalancer::with_certificate(LbType::Cf, cert, key));
        }
        PlanGenerator::new().plan(&config).await.expect("plan");
        ArtifactStore::new(temp.path())
    }

    fn swap_script(temp: &TempDir, name: &str, body: &str) {
        std::fs::write(temp.path().join(name), body).expect("swap script");
    }

    fn cf_outputs() -> FakeProvisioner {
        FakeProvisioner::with_outputs(&[
            ("jumpbox_url", "203.0.113.5:22"),
            ("director_address", "https://10.0.0.6:25555"),
            ("cf_lb_url", "https://203.0.113.10"),
        ])
    }

    #[tokio::test]
    async fn test_modified_scripts_run_in_order() {
        let temp = TempDir::new().expect("temp dir");
        let store = planned_env(&temp, true).await;

        // The operator rewrites both creation scripts after plan; up must
        // run exactly these, jumpbox before director.
        swap_script(&temp, "create-jumpbox.sh", "#!/bin/sh\necho 'jumpbox' >> create-env-output\n");
        swap_script(&temp, "create-director.sh", "#!/bin/sh\necho 'director' >> create-env-output\n");

        let director = SharedDirector::new();
        let handle = director.clone();
        let pipeline = ApplyPipeline::new(store, cf_outputs(), move |_| handle.clone());

        let report = pipeline.run().await.expect("up");

        let log = std::fs::read_to_string(temp.path().join("create-env-output")).expect("log");
        assert_eq!(log, "jumpbox\ndirector\n");

        // The merged cloud configuration reached the director.
        let uploaded = director.uploaded_config().expect("upload happened");
        assert!(uploaded.contains(CF_ROUTER_EXTENSION));
        assert!(uploaded.contains(CF_SSH_PROXY_EXTENSION));
        assert!(uploaded.contains(CF_TCP_ROUTER_EXTENSION));

        // Endpoints resolved from the captured outputs.
        assert!(report
            .endpoints
            .iter()
            .any(|e| e.output_key == "cf_lb_url" && e.address == "https://203.0.113.10"));

        let state = StateFile::new(temp.path())
            .load()
            .await
            .expect("load")
            .expect("record");
        assert_eq!(state.phase, Phase::Up);
        assert_eq!(
            state.jumpbox.map(|j| j.address).as_deref(),
            Some("203.0.113.5:22")
        );
    }

    #[tokio::test]
    async fn test_failed_step_halts_and_preserves_captured_state() {
        let temp = TempDir::new().expect("temp dir");
        let store = planned_env(&temp, false).await;

        swap_script(&temp, "create-jumpbox.sh", "#!/bin/sh\ntrue\n");
        swap_script(&temp, "create-director.sh", "#!/bin/sh\necho 'no quota' >&2\nexit 1\n");

        let director = SharedDirector::new();
        let handle = director.clone();
        let pipeline = ApplyPipeline::new(
            store,
            FakeProvisioner::with_outputs(&[("jumpbox_url", "203.0.113.5:22")]),
            move |_| handle.clone(),
        );

        let err = pipeline.run().await.expect_err("director step fails");
        match err {
            PlinthError::Step(StepError::ExecutionFailed { step, stderr, .. }) => {
                assert_eq!(step, steps::CREATE_DIRECTOR);
                assert!(stderr.contains("no quota"));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Outputs captured before the failure were persisted and the phase
        // did not advance, so a corrected re-run resumes cleanly.
        let state = StateFile::new(temp.path())
            .load()
            .await
            .expect("load")
            .expect("record");
        assert_eq!(state.phase, Phase::Planned);
        assert_eq!(
            state.output_str("jumpbox_url").as_deref(),
            Some("203.0.113.5:22")
        );
        assert!(director.uploaded_config().is_none());
    }

    #[tokio::test]
    async fn test_upload_rejection_does_not_fail_up() {
        let temp = TempDir::new().expect("temp dir");
        let store = planned_env(&temp, true).await;

        let director = SharedDirector::rejecting();
        let handle = director.clone();
        let pipeline = ApplyPipeline::new(store, cf_outputs(), move |_| handle.clone());

        let report = pipeline.run().await.expect("up succeeds anyway");

        assert!(!report.cloud_config_uploaded);
        assert!(report
            .upload_error
            .as_deref()
            .is_some_and(|e| e.contains("director unreachable")));

        let state = StateFile::new(temp.path())
            .load()
            .await
            .expect("load")
            .expect("record");
        assert_eq!(state.phase, Phase::Up);
    }

    #[tokio::test]
    async fn test_up_requires_planned_phase() {
        let temp = TempDir::new().expect("temp dir");
        let store = planned_env(&temp, false).await;

        // Force the record into a destroyed phase.
        let state_file = StateFile::new(temp.path());
        let mut state = state_file.load().await.expect("load").expect("record");
        state.set_phase(Phase::Destroyed);
        state_file.save(&state).await.expect("save");

        let director = SharedDirector::new();
        let handle = director.clone();
        let pipeline = ApplyPipeline::new(
            store,
            FakeProvisioner::with_outputs(&[]),
            move |_| handle.clone(),
        );

        let err = pipeline.run().await.expect_err("phase violation");
        assert!(matches!(
            err,
            PlinthError::Store(crate::error::StoreError::PhaseViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_lb_output_fails_endpoint_step() {
        let temp = TempDir::new().expect("temp dir");
        let store = planned_env(&temp, true).await;

        swap_script(&temp, "create-jumpbox.sh", "#!/bin/sh\ntrue\n");
        swap_script(&temp, "create-director.sh", "#!/bin/sh\ntrue\n");

        let director = SharedDirector::new();
        let handle = director.clone();
        // Template drift: the provisioner exposes no cf outputs.
        let pipeline = ApplyPipeline::new(
            store,
            FakeProvisioner::with_outputs(&[("jumpbox_url", "203.0.113.5:22")]),
            move |_| handle.clone(),
        );

        let err = pipeline.run().await.expect_err("endpoints unresolved");
        assert!(matches!(
            err,
            PlinthError::Endpoint(crate::error::EndpointError::Unresolved { .. })
        ));
    }
}
