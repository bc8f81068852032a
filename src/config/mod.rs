//! Environment declaration parsing and validation.

mod declaration;
mod validator;

pub use declaration::{EnvironmentConfig, Iaas, LbType, LoadBalancer};
pub use validator::DeclarationValidator;

use crate::error::Result;
use std::path::Path;

/// Loads `.env` from the state directory if present.
///
/// IaaS credentials (`AWS_*`, `GOOGLE_*`, `ARM_*`, `TF_VAR_*`) are commonly
/// kept next to the artifacts; the external collaborators inherit them
/// through the process environment.
///
/// # Errors
///
/// Returns an error only if the file exists but cannot be parsed.
pub fn load_dotenv(state_dir: &Path) -> Result<()> {
    let env_path = state_dir.join(".env");
    if env_path.is_file() {
        dotenvy::from_path(&env_path)
            .map_err(|e| crate::error::PlinthError::internal(format!("Failed to load .env: {e}")))?;
        tracing::debug!("Loaded environment from {}", env_path.display());
    }
    Ok(())
}
