//! Cloud configuration reconciliation.
//!
//! Merges the load-balancer-derived extension records into the director's
//! cloud configuration and uploads the result. The director is reached
//! through the [`DirectorAdapter`] seam; production uses the external
//! `bosh` CLI, tests use an in-memory adapter.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{Iaas, LbType};
use crate::error::{CloudConfigError, PlinthError, Result};

use super::document::CloudConfigDocument;
use super::extensions::extensions_for_all;

/// Seam to the external director tool.
#[async_trait]
pub trait DirectorAdapter: Send + Sync {
    /// Fetches the director's current cloud configuration.
    ///
    /// Returns `None` when the director has no configuration yet.
    async fn fetch_cloud_config(&self) -> Result<Option<String>>;

    /// Uploads a cloud configuration document to the director.
    async fn upload_cloud_config(&self, document: &str) -> Result<()>;
}

/// Director adapter backed by the `bosh` CLI.
///
/// The CLI resolves the target director and its credentials from the
/// `BOSH_ENVIRONMENT` / `BOSH_CLIENT` family of variables, which the
/// creation scripts leave behind via the vars store.
#[derive(Debug, Clone)]
pub struct BoshCli {
    /// Director address passed as `-e`.
    environment: String,
}

impl BoshCli {
    /// Creates an adapter targeting the given director address.
    #[must_use]
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
        }
    }

    async fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<std::process::Output> {
        let mut cmd = Command::new("bosh");
        cmd.arg("-e").arg(&self.environment);
        cmd.arg("-n");
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!("Running: bosh -e {} -n {}", self.environment, args.join(" "));

        if let Some(input) = stdin {
            cmd.stdin(Stdio::piped());
            let mut child = cmd.spawn()?;
            if let Some(mut handle) = child.stdin.take() {
                use tokio::io::AsyncWriteExt;
                handle.write_all(input.as_bytes()).await?;
            }
            Ok(child.wait_with_output().await?)
        } else {
            Ok(cmd.output().await?)
        }
    }
}

#[async_trait]
impl DirectorAdapter for BoshCli {
    async fn fetch_cloud_config(&self) -> Result<Option<String>> {
        let output = self.run(&["cloud-config"], None).await?;

        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()))
        } else {
            // A director without a cloud config reports an error; treat it
            // as "nothing uploaded yet" rather than a failure.
            debug!(
                "No cloud config fetched: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            Ok(None)
        }
    }

    async fn upload_cloud_config(&self, document: &str) -> Result<()> {
        let output = self.run(&["update-cloud-config", "-"], Some(document)).await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(PlinthError::CloudConfig(CloudConfigError::upload(
                String::from_utf8_lossy(&output.stderr).to_string(),
            )))
        }
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// The merged document.
    pub document: CloudConfigDocument,
    /// Whether the merged document differed from the fetched one.
    pub changed: bool,
    /// Whether an upload was performed and accepted.
    pub uploaded: bool,
    /// Upload rejection diagnostics, if the director refused the document.
    pub upload_error: Option<String>,
}

/// Reconciles load-balancer extensions into the director's configuration.
pub struct CloudConfigReconciler<A: DirectorAdapter> {
    adapter: A,
}

impl<A: DirectorAdapter> CloudConfigReconciler<A> {
    /// Creates a reconciler over the given director adapter.
    #[must_use]
    pub const fn new(adapter: A) -> Self {
        Self { adapter }
    }

    /// Fetches, merges, and uploads the cloud configuration.
    ///
    /// The merge starts from the director's current document when one
    /// exists, otherwise from the base artifact. The upload only happens
    /// when the merge changed something. An upload rejection is captured
    /// in the outcome rather than propagated, so the caller decides
    /// whether it is fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if a document cannot be parsed or the fetch itself
    /// fails at the transport level.
    pub async fn reconcile(
        &self,
        base_yaml: &str,
        iaas: Iaas,
        lb_types: &[LbType],
        env_id: &str,
    ) -> Result<ReconcileOutcome> {
        let fetched = self.adapter.fetch_cloud_config().await?;

        let current = match &fetched {
            Some(text) => CloudConfigDocument::from_yaml(text)?,
            None => CloudConfigDocument::empty(),
        };

        let mut merged = if current.is_empty() {
            CloudConfigDocument::from_yaml(base_yaml)?
        } else {
            current.clone()
        };
        merged.merge_extensions(extensions_for_all(iaas, lb_types, env_id));

        let changed = merged != current;
        if !changed {
            debug!("Cloud config already converged; skipping upload");
            return Ok(ReconcileOutcome {
                document: merged,
                changed: false,
                uploaded: false,
                upload_error: None,
            });
        }

        let rendered = merged.to_yaml()?;
        match self.adapter.upload_cloud_config(&rendered).await {
            Ok(()) => {
                info!("Uploaded cloud config ({} extensions)", merged.vm_extensions().len());
                Ok(ReconcileOutcome {
                    document: merged,
                    changed: true,
                    uploaded: true,
                    upload_error: None,
                })
            }
            Err(e) => {
                // The previous configuration remains authoritative on the
                // director; surface the rejection without losing the merge.
                warn!("Cloud config upload rejected: {e}");
                Ok(ReconcileOutcome {
                    document: merged,
                    changed: true,
                    uploaded: false,
                    upload_error: Some(e.to_string()),
                })
            }
        }
    }
}

/// Renders the merged cloud configuration without contacting the director.
///
/// Used by the `cloud-config` command to show what reconciliation would
/// upload.
///
/// # Errors
///
/// Returns an error if the base document cannot be parsed.
pub fn render_merged(
    base_yaml: &str,
    iaas: Iaas,
    lb_types: &[LbType],
    env_id: &str,
) -> Result<CloudConfigDocument> {
    let mut document = CloudConfigDocument::from_yaml(base_yaml)?;
    document.merge_extensions(extensions_for_all(iaas, lb_types, env_id));
    Ok(document)
}
