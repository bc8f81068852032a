//! The artifact store: generated files, variables, and the environment record.

mod artifact;
mod state;
mod store;
mod vars;

pub use artifact::{fingerprint, Artifact, ArtifactKind};
pub use state::{EnvironmentState, HostRecord, Phase, StateFile, STATE_FILE, STATE_VERSION};
pub use store::{ArtifactStore, WriteOutcome};
pub use vars::{VarsStore, VARS_DIR};
