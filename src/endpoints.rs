//! Load-balancer endpoint reporting.
//!
//! Resolves the reachable address for every declared load balancer from
//! the structured outputs the provisioning step captured, using the
//! stable key convention `<type>_lb_url` / `<type>_lb_ip` (plus
//! per-component keys such as `cf_router_lb_url`). A declared type with
//! no matching output signals drift between the declarations and what the
//! infrastructure template actually produced.

use crate::config::LbType;
use crate::error::{EndpointError, PlinthError, Result};
use crate::store::EnvironmentState;

/// One resolved load-balancer endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LbEndpoint {
    /// The declared type this endpoint belongs to.
    pub lb_type: LbType,
    /// The provisioning output key that produced the address.
    pub output_key: String,
    /// The resolved address.
    pub address: String,
}

/// Resolves endpoints from captured provisioning outputs.
#[derive(Debug, Default)]
pub struct EndpointReporter;

impl EndpointReporter {
    /// Creates a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolves the endpoints for every declared load balancer.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Unresolved`] for the first declared type
    /// with no matching output key.
    pub fn resolve(&self, state: &EnvironmentState) -> Result<Vec<LbEndpoint>> {
        let mut endpoints = Vec::new();

        for lb in &state.load_balancers {
            let matched = Self::resolve_type(state, lb.lb_type);
            if matched.is_empty() {
                return Err(PlinthError::Endpoint(EndpointError::Unresolved {
                    lb_type: lb.lb_type.to_string(),
                }));
            }
            endpoints.extend(matched);
        }

        Ok(endpoints)
    }

    /// Collects every output key belonging to one load-balancer type.
    ///
    /// The primary keys (`<type>_lb_url`, `<type>_lb_ip`) come first,
    /// followed by component keys (`<type>_<component>_lb_url` and the ip
    /// variant) in output order.
    fn resolve_type(state: &EnvironmentState, lb_type: LbType) -> Vec<LbEndpoint> {
        let type_prefix = lb_type.as_str();
        let mut matched = Vec::new();

        for primary in [format!("{type_prefix}_lb_url"), format!("{type_prefix}_lb_ip")] {
            if let Some(address) = state.output_str(&primary) {
                matched.push(LbEndpoint {
                    lb_type,
                    output_key: primary,
                    address,
                });
            }
        }

        let component_prefix = format!("{type_prefix}_");
        for key in state.outputs.keys() {
            let is_component = key.starts_with(&component_prefix)
                && (key.ends_with("_lb_url") || key.ends_with("_lb_ip"))
                && key != &format!("{type_prefix}_lb_url")
                && key != &format!("{type_prefix}_lb_ip");
            if is_component {
                if let Some(address) = state.output_str(key) {
                    matched.push(LbEndpoint {
                        lb_type,
                        output_key: key.clone(),
                        address,
                    });
                }
            }
        }

        matched
    }
}
