//! The plan generator.
//!
//! Computes the desired artifact set from the declared inputs and writes
//! it into the store through the three-way preserve policy, then updates
//! the environment record. A failed plan commits nothing: validation runs
//! before any write, and every write is atomic.

use tracing::{debug, info};

use crate::config::{DeclarationValidator, EnvironmentConfig};
use crate::error::Result;
use crate::store::{
    ArtifactStore, EnvironmentState, Phase, StateFile, VarsStore, WriteOutcome,
};

use super::templates;

/// Generates the artifact set for an environment.
#[derive(Debug, Default)]
pub struct PlanGenerator {
    validator: DeclarationValidator,
}

/// Outcome of one plan invocation.
#[derive(Debug)]
pub struct PlanSummary {
    /// Environment name.
    pub env_id: String,
    /// Per-artifact outcomes, in generation order.
    pub entries: Vec<PlanEntry>,
    /// Whether the vars store was seeded on this run.
    pub vars_seeded: bool,
}

/// Outcome for a single artifact.
#[derive(Debug)]
pub struct PlanEntry {
    /// Logical artifact name.
    pub name: String,
    /// What the preserve policy decided.
    pub outcome: WriteOutcome,
}

impl PlanGenerator {
    /// Creates a new plan generator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            validator: DeclarationValidator::new(),
        }
    }

    /// Runs a plan: validates, writes artifacts, persists the record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDeclaration`-class errors before any mutation, and
    /// `StoreUnwritable`-class errors if the store cannot be written.
    pub async fn plan(&self, config: &EnvironmentConfig) -> Result<PlanSummary> {
        self.validator.validate(config)?;

        let store = ArtifactStore::new(&config.state_dir);
        store.ensure_root().await?;

        let state_file = StateFile::new(store.root());
        let mut state = match state_file.load().await? {
            Some(existing) => existing,
            None => EnvironmentState::new(&config.env_id, config.iaas),
        };

        if state.phase == Phase::Destroyed {
            // Planning a destroyed environment starts a fresh lifecycle.
            debug!("Replanning destroyed environment '{}'", state.env_id);
            let fingerprints = state.artifact_fingerprints.clone();
            state = EnvironmentState::new(&config.env_id, config.iaas);
            state.artifact_fingerprints = fingerprints;
        }

        let mut entries = Vec::new();
        for artifact in templates::desired_artifacts(config) {
            let recorded = state.fingerprint_of(&artifact.name).map(str::to_string);
            let outcome = store.apply(&artifact, recorded.as_deref()).await?;

            match outcome {
                WriteOutcome::Created | WriteOutcome::Regenerated => {
                    state.record_fingerprint(&artifact.name, artifact.fingerprint());
                }
                WriteOutcome::Unchanged | WriteOutcome::Preserved => {}
            }

            entries.push(PlanEntry {
                name: artifact.name,
                outcome,
            });
        }

        let vars = VarsStore::new(store.root(), &config.env_id);
        let vars_seeded = vars.ensure_seeded().await?;

        state.load_balancers.clone_from(&config.load_balancers);
        if state.phase == Phase::Unplanned {
            state.set_phase(Phase::Planned);
        }
        state_file.save(&state).await?;

        info!(
            "Planned environment '{}' on {} ({} artifacts)",
            config.env_id,
            config.iaas,
            entries.len()
        );

        Ok(PlanSummary {
            env_id: config.env_id.clone(),
            entries,
            vars_seeded,
        })
    }
}

impl PlanSummary {
    /// Returns the number of artifacts the operator owns.
    #[must_use]
    pub fn preserved_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == WriteOutcome::Preserved)
            .count()
    }

    /// Returns the number of artifacts written on this run.
    #[must_use]
    pub fn written_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| {
                matches!(
                    e.outcome,
                    WriteOutcome::Created | WriteOutcome::Regenerated
                )
            })
            .count()
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Plan for environment '{}':", self.env_id)?;
        for entry in &self.entries {
            writeln!(f, "  {:<20} {}", entry.name, entry.outcome)?;
        }
        if self.vars_seeded {
            writeln!(f, "  {:<20} seeded", "vars-store")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Iaas, LbType, LoadBalancer};
    use crate::plan::templates::names;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> EnvironmentConfig {
        EnvironmentConfig::new("test-env", Iaas::Aws, dir.path())
    }

    fn cert_pair(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        let cert = dir.path().join("lb.crt");
        let key = dir.path().join("lb.key");
        let mut f = std::fs::File::create(&cert).expect("cert");
        f.write_all(b"cert-material").expect("write");
        let mut f = std::fs::File::create(&key).expect("key");
        f.write_all(b"key-material").expect("write");
        (cert, key)
    }

    fn read_artifact(dir: &TempDir, rel: &str) -> String {
        std::fs::read_to_string(dir.path().join(rel)).expect("artifact exists")
    }

    #[tokio::test]
    async fn test_first_plan_creates_everything() {
        let temp = TempDir::new().expect("temp dir");
        let summary = PlanGenerator::new()
            .plan(&config_for(&temp))
            .await
            .expect("plan");

        assert_eq!(summary.written_count(), summary.entries.len());
        assert!(summary.vars_seeded);
        assert!(temp.path().join("create-jumpbox.sh").exists());
        assert!(temp.path().join("terraform/template.tf").exists());
        assert!(temp.path().join("cloud-config/cloud-config.yml").exists());
        assert!(temp.path().join("vars/test-env-variables.yml").exists());

        let state = StateFile::new(temp.path())
            .load()
            .await
            .expect("load")
            .expect("record");
        assert_eq!(state.phase, Phase::Planned);
        assert!(state.fingerprint_of(names::CREATE_JUMPBOX).is_some());
    }

    #[tokio::test]
    async fn test_replan_is_idempotent() {
        let temp = TempDir::new().expect("temp dir");
        let generator = PlanGenerator::new();
        let config = config_for(&temp);

        generator.plan(&config).await.expect("first plan");
        let before = read_artifact(&temp, "terraform/template.tf");

        let summary = generator.plan(&config).await.expect("second plan");
        let after = read_artifact(&temp, "terraform/template.tf");

        assert_eq!(before, after);
        assert_eq!(summary.written_count(), 0);
        assert!(!summary.vars_seeded);
    }

    #[tokio::test]
    async fn test_new_lb_propagates_into_owned_template() {
        let temp = TempDir::new().expect("temp dir");
        let generator = PlanGenerator::new();
        let (cert, key) = cert_pair(&temp);

        generator.plan(&config_for(&temp)).await.expect("plan");
        assert!(!read_artifact(&temp, "terraform/template.tf").contains("cf_lb_url"));

        let with_lb = config_for(&temp)
            .with_load_balancer(LoadBalancer::with_certificate(LbType::Cf, cert, key));
        generator.plan(&with_lb).await.expect("replan");

        assert!(read_artifact(&temp, "terraform/template.tf").contains("cf_lb_url"));
    }

    #[tokio::test]
    async fn test_user_edit_survives_replan_with_new_declarations() {
        let temp = TempDir::new().expect("temp dir");
        let generator = PlanGenerator::new();
        let (cert, key) = cert_pair(&temp);

        generator.plan(&config_for(&temp)).await.expect("plan");

        // Operator rewrites the jumpbox script between plan runs.
        let edited = "#!/bin/sh\necho jumpbox >> markers\n";
        std::fs::write(temp.path().join("create-jumpbox.sh"), edited).expect("edit");

        let with_lb = config_for(&temp)
            .with_load_balancer(LoadBalancer::with_certificate(LbType::Cf, cert, key));
        let summary = generator.plan(&with_lb).await.expect("replan");

        // The edited script is byte-for-byte intact while the template
        // regenerated to pick up the new load balancer.
        assert_eq!(read_artifact(&temp, "create-jumpbox.sh"), edited);
        assert!(read_artifact(&temp, "terraform/template.tf").contains("cf_lb_url"));
        assert_eq!(summary.preserved_count(), 1);
    }

    #[tokio::test]
    async fn test_vars_survive_replan() {
        let temp = TempDir::new().expect("temp dir");
        let generator = PlanGenerator::new();
        let config = config_for(&temp);

        generator.plan(&config).await.expect("first plan");
        let before = read_artifact(&temp, "vars/test-env-variables.yml");

        generator.plan(&config).await.expect("second plan");
        let after = read_artifact(&temp, "vars/test-env-variables.yml");

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_invalid_declaration_mutates_nothing() {
        let temp = TempDir::new().expect("temp dir");
        let config = config_for(&temp).with_load_balancer(LoadBalancer::with_certificate(
            LbType::Cf,
            "/nonexistent/lb.crt",
            "/nonexistent/lb.key",
        ));

        PlanGenerator::new()
            .plan(&config)
            .await
            .expect_err("must fail validation");

        assert!(!temp.path().join("create-jumpbox.sh").exists());
        assert!(!StateFile::new(temp.path()).exists());
    }

    #[tokio::test]
    async fn test_lb_declarations_recorded_in_state() {
        let temp = TempDir::new().expect("temp dir");
        let (cert, key) = cert_pair(&temp);
        let config = config_for(&temp)
            .with_load_balancer(LoadBalancer::with_certificate(LbType::Cf, cert, key));

        PlanGenerator::new().plan(&config).await.expect("plan");

        let state = StateFile::new(temp.path())
            .load()
            .await
            .expect("load")
            .expect("record");
        assert_eq!(state.load_balancers.len(), 1);
        assert_eq!(state.load_balancers[0].lb_type, LbType::Cf);
    }
}
