//! Environment and load-balancer declarations.
//!
//! These types describe the desired environment: which IaaS to target,
//! what the environment is called, and which load balancers it should
//! expose. They are the inputs the plan generator turns into artifacts.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::DeclarationError;

/// Supported IaaS providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Iaas {
    /// Amazon Web Services.
    Aws,
    /// Google Cloud Platform.
    Gcp,
    /// Microsoft Azure.
    Azure,
}

/// Supported load-balancer types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LbType {
    /// Cloud Foundry routing tier (router, SSH proxy, TCP router).
    Cf,
    /// Concourse web load balancer.
    Concourse,
}

/// A declared load balancer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancer {
    /// Load-balancer type.
    #[serde(rename = "type")]
    pub lb_type: LbType,
    /// Path to the TLS certificate, if the type requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<PathBuf>,
    /// Path to the TLS private key, if the type requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<PathBuf>,
}

/// The full declared environment: identity plus requested load balancers.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// Stable environment name.
    pub env_id: String,
    /// Target IaaS.
    pub iaas: Iaas,
    /// Requested load balancers.
    pub load_balancers: Vec<LoadBalancer>,
    /// Artifact store root directory.
    pub state_dir: PathBuf,
}

impl Iaas {
    /// Returns the lowercase provider name used in artifact content.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Azure => "azure",
        }
    }
}

impl FromStr for Iaas {
    type Err = DeclarationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            "gcp" => Ok(Self::Gcp),
            "azure" => Ok(Self::Azure),
            _ => Err(DeclarationError::UnknownIaas {
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Iaas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl LbType {
    /// Returns the lowercase type name used in output keys and extensions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cf => "cf",
            Self::Concourse => "concourse",
        }
    }

    /// Returns true if this type requires certificate and key material.
    #[must_use]
    pub const fn requires_certificate(self) -> bool {
        matches!(self, Self::Cf)
    }
}

impl FromStr for LbType {
    type Err = DeclarationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cf" => Ok(Self::Cf),
            "concourse" => Ok(Self::Concourse),
            _ => Err(DeclarationError::UnknownLbType {
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for LbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl LoadBalancer {
    /// Creates a declaration without certificate material.
    #[must_use]
    pub const fn new(lb_type: LbType) -> Self {
        Self {
            lb_type,
            cert: None,
            key: None,
        }
    }

    /// Creates a declaration with certificate and key paths.
    #[must_use]
    pub fn with_certificate(
        lb_type: LbType,
        cert: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
    ) -> Self {
        Self {
            lb_type,
            cert: Some(cert.into()),
            key: Some(key.into()),
        }
    }
}

impl EnvironmentConfig {
    /// Creates a new environment configuration.
    #[must_use]
    pub fn new(env_id: impl Into<String>, iaas: Iaas, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            env_id: env_id.into(),
            iaas,
            load_balancers: Vec::new(),
            state_dir: state_dir.into(),
        }
    }

    /// Adds a load-balancer declaration.
    #[must_use]
    pub fn with_load_balancer(mut self, lb: LoadBalancer) -> Self {
        self.load_balancers.push(lb);
        self
    }

    /// Returns the declared load-balancer types.
    #[must_use]
    pub fn lb_types(&self) -> Vec<LbType> {
        self.load_balancers.iter().map(|lb| lb.lb_type).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iaas_parse_roundtrip() {
        for name in ["aws", "gcp", "azure"] {
            let iaas: Iaas = name.parse().expect("known provider");
            assert_eq!(iaas.as_str(), name);
        }
    }

    #[test]
    fn test_iaas_parse_unknown() {
        let err = "vsphere".parse::<Iaas>().expect_err("unknown provider");
        assert!(matches!(err, DeclarationError::UnknownIaas { .. }));
    }

    #[test]
    fn test_lb_type_certificate_rules() {
        assert!(LbType::Cf.requires_certificate());
        assert!(!LbType::Concourse.requires_certificate());
    }

    #[test]
    fn test_lb_type_parse_unknown() {
        let err = "nlb".parse::<LbType>().expect_err("unknown type");
        assert!(matches!(err, DeclarationError::UnknownLbType { .. }));
    }
}
