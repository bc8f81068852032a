//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Plinth - cloud control-plane bootstrapper.
#[derive(Parser, Debug)]
#[command(name = "plinth")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Artifact store directory.
    #[arg(short, long, global = true, env = "PLINTH_STATE_DIR", default_value = ".")]
    pub state_dir: PathBuf,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate (or refresh) the artifact set for an environment.
    Plan {
        /// Environment name.
        #[arg(long)]
        name: String,

        /// IaaS provider (aws, gcp, azure).
        #[arg(long)]
        iaas: String,

        /// Load balancer type to provision (cf, concourse). Repeatable.
        #[arg(long = "lb-type")]
        lb_type: Vec<String>,

        /// Path to the load balancer TLS certificate.
        #[arg(long = "lb-cert")]
        lb_cert: Option<PathBuf>,

        /// Path to the load balancer TLS private key.
        #[arg(long = "lb-key")]
        lb_key: Option<PathBuf>,
    },

    /// Provision the environment from its artifacts (plans first if needed).
    Up {
        /// Environment name (required only when no plan exists yet).
        #[arg(long)]
        name: Option<String>,

        /// IaaS provider (required only when no plan exists yet).
        #[arg(long)]
        iaas: Option<String>,

        /// Load balancer type to provision (cf, concourse). Repeatable.
        #[arg(long = "lb-type")]
        lb_type: Vec<String>,

        /// Path to the load balancer TLS certificate.
        #[arg(long = "lb-cert")]
        lb_cert: Option<PathBuf>,

        /// Path to the load balancer TLS private key.
        #[arg(long = "lb-key")]
        lb_key: Option<PathBuf>,
    },

    /// Tear the environment down (director, jumpbox, network).
    Down {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the addresses of the declared load balancers.
    Lbs,

    /// Print the reconciled cloud configuration document.
    CloudConfig,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Machine-readable JSON.
    Json,
}
