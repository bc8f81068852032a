// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Plinth
//!
//! A declarative, idempotent bootstrapper for minimal cloud control-plane
//! infrastructure: a network, a jumpbox (bastion host), and a director.
//!
//! ## Overview
//!
//! Plinth takes an environment from nothing to a running director with
//! load-balanced endpoints through a three-phase lifecycle:
//!
//! - **plan** generates a reusable, operator-editable artifact set:
//!   creation and deletion scripts, an infrastructure template, a
//!   write-once variable store, and a base cloud configuration.
//! - **up** executes the artifacts in order: provision the network,
//!   create the jumpbox, create the director, reconcile the director's
//!   cloud configuration, and report load-balancer endpoints.
//! - **down** reverses it: delete the director, the jumpbox, and the
//!   network.
//!
//! ## Edit anything, lose nothing
//!
//! Every artifact carries a generation fingerprint. A file whose content
//! still matches its fingerprint is generator-owned and regenerates
//! freely; the moment an operator edits it, ownership transfers and plinth
//! never touches it again. The pipelines always execute whatever is on
//! disk, so edits made between plan and up are exactly what runs.
//!
//! ## Modules
//!
//! - [`config`]: environment and load-balancer declarations
//! - [`store`]: the artifact store, variable store, and environment record
//! - [`plan`]: desired artifact computation and the preserve policy
//! - [`pipeline`]: apply/teardown execution and external collaborators
//! - [`cloudconfig`]: cloud configuration merge and reconciliation
//! - [`endpoints`]: load-balancer endpoint reporting
//! - [`cli`]: command-line interface
//!
//! ## Example
//!
//! ```sh
//! plinth plan --name prod --iaas aws --lb-type cf \
//!     --lb-cert lb.crt --lb-key lb.key
//! vim create-jumpbox.sh   # edits survive every future plan
//! plinth up
//! plinth lbs
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod cloudconfig;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormat, OutputFormatter};
pub use cloudconfig::{
    BoshCli, CloudConfigDocument, CloudConfigReconciler, DirectorAdapter, VmExtension,
};
pub use config::{DeclarationValidator, EnvironmentConfig, Iaas, LbType, LoadBalancer};
pub use endpoints::{EndpointReporter, LbEndpoint};
pub use error::{PlinthError, Result};
pub use pipeline::{
    ApplyPipeline, ApplyReport, InfraProvisioner, ScriptRunner, TeardownPipeline, TerraformCli,
};
pub use plan::{PlanGenerator, PlanSummary};
pub use store::{Artifact, ArtifactStore, EnvironmentState, Phase, StateFile, VarsStore};
