//! Error types for the plinth bootstrapper.
//!
//! This module provides a comprehensive error hierarchy for all operations
//! in the environment lifecycle: declarations, the artifact store, pipeline
//! steps, cloud configuration, and endpoint reporting.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the plinth bootstrapper.
#[derive(Debug, Error)]
pub enum PlinthError {
    /// Invalid load-balancer or environment declaration.
    #[error("Invalid declaration: {0}")]
    Declaration(#[from] DeclarationError),

    /// Artifact store errors.
    #[error("Artifact store error: {0}")]
    Store(#[from] StoreError),

    /// Pipeline step errors.
    #[error("Pipeline error: {0}")]
    Step(#[from] StepError),

    /// Cloud configuration errors.
    #[error("Cloud config error: {0}")]
    CloudConfig(#[from] CloudConfigError),

    /// Endpoint reporting errors.
    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Declaration validation errors.
///
/// All of these are raised before any mutation takes place, so a failed
/// plan leaves prior state untouched.
#[derive(Debug, Error)]
pub enum DeclarationError {
    /// The referenced load-balancer certificate does not exist.
    #[error("Load balancer certificate not found: {path}")]
    MissingCertificate {
        /// Path to the missing certificate.
        path: PathBuf,
    },

    /// The referenced load-balancer private key does not exist.
    #[error("Load balancer key not found: {path}")]
    MissingKey {
        /// Path to the missing key.
        path: PathBuf,
    },

    /// The load-balancer type requires a certificate and key.
    #[error("Load balancer type '{lb_type}' requires --lb-cert and --lb-key")]
    CertificateRequired {
        /// The load-balancer type missing its certificate material.
        lb_type: String,
    },

    /// Unknown load-balancer type.
    #[error("Unknown load balancer type: {value}")]
    UnknownLbType {
        /// The unrecognized type string.
        value: String,
    },

    /// Unknown IaaS provider.
    #[error("Unknown IaaS provider: {value}")]
    UnknownIaas {
        /// The unrecognized provider string.
        value: String,
    },

    /// Duplicate load-balancer declaration.
    #[error("Duplicate load balancer declaration: {lb_type}")]
    DuplicateLb {
        /// The duplicated type.
        lb_type: String,
    },

    /// The environment name is empty or malformed.
    #[error("Invalid environment name: {message}")]
    InvalidEnvName {
        /// Description of the problem.
        message: String,
    },
}

/// Artifact store and environment record errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store directory or an artifact within it cannot be written.
    #[error("Artifact store is unwritable at {path}: {message}")]
    Unwritable {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },

    /// The environment record or an artifact is corrupted.
    #[error("Artifact store is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Serialization of a store document failed.
    #[error("Store serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },

    /// The requested operation is not valid in the current lifecycle phase.
    #[error("Environment '{env_id}' is {actual}, but this operation requires {required}")]
    PhaseViolation {
        /// Environment identifier.
        env_id: String,
        /// Phase the operation requires.
        required: String,
        /// Phase the record is actually in.
        actual: String,
    },

    /// No environment record exists where one is required.
    #[error("No environment record found in {path}; run 'plinth plan' first")]
    NoRecord {
        /// Store root that was searched.
        path: PathBuf,
    },
}

/// Pipeline step execution errors.
#[derive(Debug, Error)]
pub enum StepError {
    /// An external script or process returned a failure.
    ///
    /// Carries the step name and the process diagnostics verbatim so a
    /// corrected re-run can resume from the failing step.
    #[error("Step '{step}' failed ({status}):\n{stderr}")]
    ExecutionFailed {
        /// Name of the failed step.
        step: String,
        /// Exit status description.
        status: String,
        /// Captured standard error of the process.
        stderr: String,
    },

    /// An artifact required by a step is missing from the store.
    #[error("Step '{step}' requires artifact '{name}' at {path}, but it does not exist")]
    MissingArtifact {
        /// Step that needed the artifact.
        step: String,
        /// Logical artifact name.
        name: String,
        /// Expected path.
        path: PathBuf,
    },

    /// Structured outputs from the provisioning step could not be parsed.
    #[error("Malformed provisioning outputs: {message}")]
    MalformedOutputs {
        /// Description of the parse failure.
        message: String,
    },
}

/// Cloud configuration errors.
#[derive(Debug, Error)]
pub enum CloudConfigError {
    /// The director rejected the cloud configuration upload.
    ///
    /// The previously uploaded configuration remains authoritative.
    #[error("Cloud config upload rejected: {message}")]
    UploadFailed {
        /// Diagnostic output from the director.
        message: String,
    },

    /// The current cloud configuration could not be fetched.
    #[error("Failed to fetch cloud config: {message}")]
    FetchFailed {
        /// Diagnostic output from the director.
        message: String,
    },

    /// A cloud configuration document could not be parsed.
    #[error("Malformed cloud config: {message}")]
    Malformed {
        /// Description of the parse failure.
        message: String,
    },
}

/// Endpoint reporting errors.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// No provisioning output matched the declared load balancer.
    ///
    /// This signals drift between the declared load balancers and what the
    /// infrastructure template actually produced, not a missing resource.
    #[error("No endpoint output found for load balancer type '{lb_type}'")]
    Unresolved {
        /// The declared type with no matching output key.
        lb_type: String,
    },
}

/// Result type alias for plinth operations.
pub type Result<T> = std::result::Result<T, PlinthError>;

impl PlinthError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if re-invoking the same phase is the expected recovery.
    ///
    /// Step failures leave captured state behind and every step is
    /// idempotent by contract, so the operator fixes the cause and re-runs.
    #[must_use]
    pub const fn is_rerunnable(&self) -> bool {
        matches!(
            self,
            Self::Step(StepError::ExecutionFailed { .. })
                | Self::CloudConfig(CloudConfigError::UploadFailed { .. })
        )
    }
}

impl StoreError {
    /// Creates an unwritable-store error from a path and IO error.
    #[must_use]
    pub fn unwritable(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Unwritable {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a corruption error with the given message.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }
}

impl StepError {
    /// Creates an execution failure for a named step.
    #[must_use]
    pub fn execution(
        step: impl Into<String>,
        status: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExecutionFailed {
            step: step.into(),
            status: status.into(),
            stderr: stderr.into(),
        }
    }
}

impl CloudConfigError {
    /// Creates an upload-rejected error.
    #[must_use]
    pub fn upload(message: impl Into<String>) -> Self {
        Self::UploadFailed {
            message: message.into(),
        }
    }

    /// Creates a fetch error.
    #[must_use]
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::FetchFailed {
            message: message.into(),
        }
    }
}
