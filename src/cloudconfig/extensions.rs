//! Load-balancer extension mapping.
//!
//! Each declared load-balancer type requires a fixed set of named
//! `vm_extensions` in the director's cloud configuration, wiring deployed
//! jobs to the load balancers the infrastructure template provisioned.
//! The property shapes differ per IaaS: AWS attaches ELB names, GCP
//! target pools, Azure application gateways.

use serde_yaml::{Mapping, Value};

use crate::config::{Iaas, LbType};

use super::document::VmExtension;

/// Extension names required by a `cf` load balancer.
pub const CF_ROUTER_EXTENSION: &str = "cf-router-network-properties";
/// SSH proxy extension name.
pub const CF_SSH_PROXY_EXTENSION: &str = "diego-ssh-proxy-network-properties";
/// TCP router extension name.
pub const CF_TCP_ROUTER_EXTENSION: &str = "cf-tcp-router-network-properties";
/// Extension name required by a `concourse` load balancer.
pub const CONCOURSE_EXTENSION: &str = "lb";

/// Returns the extension records required by one declared load balancer.
#[must_use]
pub fn extensions_for(iaas: Iaas, lb_type: LbType, env_id: &str) -> Vec<VmExtension> {
    match lb_type {
        LbType::Cf => vec![
            VmExtension::new(
                CF_ROUTER_EXTENSION,
                lb_properties(iaas, env_id, "cf-router-lb"),
            ),
            VmExtension::new(
                CF_SSH_PROXY_EXTENSION,
                lb_properties(iaas, env_id, "cf-ssh-lb"),
            ),
            VmExtension::new(
                CF_TCP_ROUTER_EXTENSION,
                lb_properties(iaas, env_id, "cf-tcp-lb"),
            ),
        ],
        LbType::Concourse => vec![VmExtension::new(
            CONCOURSE_EXTENSION,
            lb_properties(iaas, env_id, "concourse-lb"),
        )],
    }
}

/// Returns the extension records for every declared type, in order.
#[must_use]
pub fn extensions_for_all(iaas: Iaas, lb_types: &[LbType], env_id: &str) -> Vec<VmExtension> {
    lb_types
        .iter()
        .flat_map(|lb_type| extensions_for(iaas, *lb_type, env_id))
        .collect()
}

/// Builds the provider-specific property mapping for one load balancer.
fn lb_properties(iaas: Iaas, env_id: &str, lb_name: &str) -> Value {
    let mut mapping = Mapping::new();
    let resource = format!("{env_id}-{lb_name}");

    match iaas {
        Iaas::Aws => {
            mapping.insert(
                Value::String(String::from("elbs")),
                Value::Sequence(vec![Value::String(resource)]),
            );
            mapping.insert(
                Value::String(String::from("security_groups")),
                Value::Sequence(vec![Value::String(format!("{env_id}-lb-internal"))]),
            );
        }
        Iaas::Gcp => {
            mapping.insert(
                Value::String(String::from("target_pool")),
                Value::String(resource),
            );
        }
        Iaas::Azure => {
            mapping.insert(
                Value::String(String::from("load_balancer")),
                Value::String(resource),
            );
        }
    }

    Value::Mapping(mapping)
}
