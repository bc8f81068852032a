//! Apply and teardown pipelines plus their external collaborators.

mod apply;
mod script;
mod teardown;
mod terraform;

pub use apply::{steps, ApplyPipeline, ApplyReport, DEFAULT_DIRECTOR_ADDRESS};
pub use script::{ScriptOutput, ScriptRunner};
pub use teardown::{TeardownPipeline, TeardownReport};
pub use terraform::{InfraProvisioner, ProvisionOutputs, ProvisionRequest, TerraformCli};
