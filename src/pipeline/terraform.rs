//! The infrastructure provisioning collaborator.
//!
//! Network topology is created and destroyed by an external
//! infrastructure-as-code tool driven over its CLI. Both operations are
//! create-or-update/delete-if-present, so a pipeline step that was killed
//! halfway is recovered by plain re-invocation.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{PlinthError, Result, StepError};

use super::apply::steps;

/// Inputs for one provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// Directory holding the infrastructure template.
    pub template_dir: PathBuf,
    /// Environment name, passed as a template variable.
    pub env_id: String,
    /// Load-balancer certificate content, when a declared type needs one.
    pub lb_cert: Option<String>,
    /// Load-balancer key content, when a declared type needs one.
    pub lb_key: Option<String>,
}

/// Structured outputs captured from a provisioning run.
pub type ProvisionOutputs = BTreeMap<String, serde_json::Value>;

/// Seam to the external provisioning tool.
#[async_trait]
pub trait InfraProvisioner: Send + Sync {
    /// Creates or updates the declared topology and returns its outputs.
    async fn apply(&self, request: &ProvisionRequest) -> Result<ProvisionOutputs>;

    /// Destroys the topology. Destroying an absent topology succeeds.
    async fn destroy(&self, request: &ProvisionRequest) -> Result<()>;
}

/// Provisioner backed by the `terraform` CLI.
#[derive(Debug, Clone, Default)]
pub struct TerraformCli;

impl TerraformCli {
    /// Creates a new terraform-backed provisioner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn run(step: &str, request: &ProvisionRequest, args: Vec<String>) -> Result<String> {
        let chdir = format!("-chdir={}", request.template_dir.display());

        let mut cmd = Command::new("terraform");
        cmd.arg(&chdir);
        cmd.args(&args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!("Running: terraform {chdir} {}", args.join(" "));

        let output = cmd.output().await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(PlinthError::Step(StepError::execution(
                step,
                output
                    .status
                    .code()
                    .map_or_else(|| String::from("killed by signal"), |c| format!("exit {c}")),
                String::from_utf8_lossy(&output.stderr).to_string(),
            )))
        }
    }

    fn var_args(request: &ProvisionRequest) -> Vec<String> {
        let mut args = vec![String::from("-var"), format!("env_id={}", request.env_id)];
        if let Some(cert) = &request.lb_cert {
            args.push(String::from("-var"));
            args.push(format!("lb_cert={cert}"));
        }
        if let Some(key) = &request.lb_key {
            args.push(String::from("-var"));
            args.push(format!("lb_key={key}"));
        }
        args
    }

    /// Parses `terraform output -json` into a flat key-value map.
    fn parse_outputs(json: &str) -> Result<ProvisionOutputs> {
        let raw: serde_json::Value = serde_json::from_str(json).map_err(|e| {
            PlinthError::Step(StepError::MalformedOutputs {
                message: e.to_string(),
            })
        })?;

        let serde_json::Value::Object(entries) = raw else {
            return Err(PlinthError::Step(StepError::MalformedOutputs {
                message: String::from("outputs are not a JSON object"),
            }));
        };

        let mut outputs = BTreeMap::new();
        for (key, entry) in entries {
            // Each entry is {"value": ..., "type": ..., "sensitive": ...}.
            let value = entry.get("value").cloned().unwrap_or(entry);
            outputs.insert(key, value);
        }
        Ok(outputs)
    }
}

#[async_trait]
impl InfraProvisioner for TerraformCli {
    async fn apply(&self, request: &ProvisionRequest) -> Result<ProvisionOutputs> {
        info!("Provisioning network for '{}'", request.env_id);

        Self::run(
            steps::PROVISION_NETWORK,
            request,
            vec![String::from("init"), String::from("-input=false")],
        )
        .await?;

        let mut apply_args = vec![
            String::from("apply"),
            String::from("-input=false"),
            String::from("-auto-approve"),
        ];
        apply_args.extend(Self::var_args(request));
        Self::run(steps::PROVISION_NETWORK, request, apply_args).await?;

        let json = Self::run(
            steps::PROVISION_NETWORK,
            request,
            vec![String::from("output"), String::from("-json")],
        )
        .await?;

        Self::parse_outputs(&json)
    }

    async fn destroy(&self, request: &ProvisionRequest) -> Result<()> {
        info!("Destroying network for '{}'", request.env_id);

        Self::run(
            steps::DESTROY_NETWORK,
            request,
            vec![String::from("init"), String::from("-input=false")],
        )
        .await?;

        let mut destroy_args = vec![
            String::from("destroy"),
            String::from("-input=false"),
            String::from("-auto-approve"),
        ];
        destroy_args.extend(Self::var_args(request));
        Self::run(steps::DESTROY_NETWORK, request, destroy_args).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_outputs_unwraps_values() {
        let json = r#"{
            "jumpbox_url": {"sensitive": false, "type": "string", "value": "10.0.0.5:22"},
            "cf_lb_url": {"sensitive": false, "type": "string", "value": "https://1.2.3.4"}
        }"#;

        let outputs = TerraformCli::parse_outputs(json).expect("parse");
        assert_eq!(
            outputs.get("jumpbox_url").and_then(|v| v.as_str()),
            Some("10.0.0.5:22")
        );
        assert_eq!(
            outputs.get("cf_lb_url").and_then(|v| v.as_str()),
            Some("https://1.2.3.4")
        );
    }

    #[test]
    fn test_parse_outputs_rejects_non_object() {
        let err = TerraformCli::parse_outputs("[1, 2]").expect_err("must fail");
        assert!(matches!(
            err,
            PlinthError::Step(StepError::MalformedOutputs { .. })
        ));
    }

    #[test]
    fn test_var_args_include_certificate_material() {
        let request = ProvisionRequest {
            template_dir: PathBuf::from("terraform"),
            env_id: String::from("test-env"),
            lb_cert: Some(String::from("cert-material")),
            lb_key: Some(String::from("key-material")),
        };

        let args = TerraformCli::var_args(&request);
        assert!(args.contains(&String::from("env_id=test-env")));
        assert!(args.contains(&String::from("lb_cert=cert-material")));
        assert!(args.contains(&String::from("lb_key=key-material")));
    }
}
