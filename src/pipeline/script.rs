//! Execution of on-disk lifecycle scripts.
//!
//! Pipeline steps never run generator-recomputed content: whatever script
//! currently sits in the store is what executes, operator edits included.
//! That file-presence dispatch is the extension point that lets operators
//! (and test harnesses) substitute their own creation or deletion steps.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{PlinthError, Result, StepError};

/// Runs lifecycle scripts out of the artifact store.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    /// Store root; scripts run with this as their working directory.
    store_root: PathBuf,
    /// Environment variables passed to every script.
    env: Vec<(String, String)>,
}

/// Captured output of a completed script.
#[derive(Debug)]
pub struct ScriptOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ScriptRunner {
    /// Creates a runner rooted at the store directory.
    #[must_use]
    pub fn new(store_root: impl Into<PathBuf>) -> Self {
        Self {
            store_root: store_root.into(),
            env: Vec::new(),
        }
    }

    /// Adds an environment variable passed to every script.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Runs the script at a store-relative path as one named pipeline step.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::MissingArtifact`] if the script does not exist
    /// and [`StepError::ExecutionFailed`] with the process diagnostics
    /// verbatim if it exits non-zero.
    pub async fn run(&self, step: &str, name: &str, rel_path: &str) -> Result<ScriptOutput> {
        let script = self.store_root.join(rel_path);
        if !script.is_file() {
            return Err(PlinthError::Step(StepError::MissingArtifact {
                step: step.to_string(),
                name: name.to_string(),
                path: script,
            }));
        }

        info!("Running step '{step}': {}", script.display());

        let output = self.command(&script).output().await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            debug!("Step '{step}' completed");
            Ok(ScriptOutput { stdout, stderr })
        } else {
            Err(PlinthError::Step(StepError::execution(
                step,
                output
                    .status
                    .code()
                    .map_or_else(|| String::from("killed by signal"), |c| format!("exit {c}")),
                stderr,
            )))
        }
    }

    fn command(&self, script: &Path) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg(script);
        cmd.current_dir(&self.store_root);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, name: &str, body: &str) {
        std::fs::write(dir.path().join(name), body).expect("write script");
    }

    #[tokio::test]
    async fn test_runs_whatever_is_on_disk() {
        let temp = TempDir::new().expect("temp dir");
        write_script(&temp, "step.sh", "#!/bin/sh\necho from-disk\n");

        let output = ScriptRunner::new(temp.path())
            .run("create-jumpbox", "create-jumpbox", "step.sh")
            .await
            .expect("run");

        assert_eq!(output.stdout.trim(), "from-disk");
    }

    #[tokio::test]
    async fn test_missing_script_is_a_step_error() {
        let temp = TempDir::new().expect("temp dir");
        let err = ScriptRunner::new(temp.path())
            .run("create-director", "create-director", "absent.sh")
            .await
            .expect_err("must fail");

        assert!(matches!(
            err,
            PlinthError::Step(StepError::MissingArtifact { .. })
        ));
    }

    #[tokio::test]
    async fn test_failure_carries_step_and_diagnostics() {
        let temp = TempDir::new().expect("temp dir");
        write_script(&temp, "step.sh", "#!/bin/sh\necho boom >&2\nexit 3\n");

        let err = ScriptRunner::new(temp.path())
            .run("create-director", "create-director", "step.sh")
            .await
            .expect_err("must fail");

        match err {
            PlinthError::Step(StepError::ExecutionFailed { step, status, stderr }) => {
                assert_eq!(step, "create-director");
                assert_eq!(status, "exit 3");
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_env_vars_reach_the_script() {
        let temp = TempDir::new().expect("temp dir");
        write_script(&temp, "step.sh", "#!/bin/sh\necho \"$PLINTH_ENV_ID\"\n");

        let output = ScriptRunner::new(temp.path())
            .with_env("PLINTH_ENV_ID", "test-env")
            .run("create-jumpbox", "create-jumpbox", "step.sh")
            .await
            .expect("run");

        assert_eq!(output.stdout.trim(), "test-env");
    }
}
