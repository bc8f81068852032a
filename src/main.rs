//! Plinth CLI entrypoint.
//!
//! This is the main entrypoint for the plinth command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use plinth::cli::{Cli, Commands, OutputFormatter};
use plinth::cloudconfig::{render_merged, BoshCli};
use plinth::config::{load_dotenv, EnvironmentConfig, Iaas, LbType, LoadBalancer};
use plinth::endpoints::EndpointReporter;
use plinth::error::{PlinthError, Result};
use plinth::pipeline::{ApplyPipeline, TeardownPipeline, TerraformCli};
use plinth::plan::{templates, PlanGenerator};
use plinth::store::{ArtifactStore, StateFile};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let state_dir = cli.state_dir;

    load_dotenv(&state_dir)?;

    match cli.command {
        Commands::Plan {
            name,
            iaas,
            lb_type,
            lb_cert,
            lb_key,
        } => cmd_plan(&state_dir, &name, &iaas, &lb_type, lb_cert, lb_key, &formatter).await,
        Commands::Up {
            name,
            iaas,
            lb_type,
            lb_cert,
            lb_key,
        } => cmd_up(&state_dir, name, iaas, &lb_type, lb_cert, lb_key, &formatter).await,
        Commands::Down { yes } => cmd_down(&state_dir, yes, &formatter).await,
        Commands::Lbs => cmd_lbs(&state_dir, &formatter).await,
        Commands::CloudConfig => cmd_cloud_config(&state_dir).await,
    }
}

/// Generate the artifact set.
async fn cmd_plan(
    state_dir: &Path,
    name: &str,
    iaas: &str,
    lb_types: &[String],
    lb_cert: Option<PathBuf>,
    lb_key: Option<PathBuf>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = build_config(state_dir, name, iaas, lb_types, lb_cert, lb_key)?;
    let summary = PlanGenerator::new().plan(&config).await?;

    eprintln!("{}", formatter.format_plan(&summary));
    Ok(())
}

/// Converge live infrastructure toward the artifact-described state.
async fn cmd_up(
    state_dir: &Path,
    name: Option<String>,
    iaas: Option<String>,
    lb_types: &[String],
    lb_cert: Option<PathBuf>,
    lb_key: Option<PathBuf>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let state_file = StateFile::new(state_dir);

    // Implicit plan when no record exists yet.
    if state_file.exists() {
        debug!("Existing plan found; applying artifacts as they are on disk");
    } else {
        let name = name.ok_or_else(|| {
            PlinthError::internal("no plan exists here; pass --name and --iaas or run 'plinth plan'")
        })?;
        let iaas = iaas.ok_or_else(|| {
            PlinthError::internal("no plan exists here; pass --name and --iaas or run 'plinth plan'")
        })?;

        info!("No plan found; planning '{name}' before up");
        let config = build_config(state_dir, &name, &iaas, lb_types, lb_cert, lb_key)?;
        let summary = PlanGenerator::new().plan(&config).await?;
        eprintln!("{}", formatter.format_plan(&summary));
    }

    let store = ArtifactStore::new(state_dir);
    let pipeline = ApplyPipeline::new(store, TerraformCli::new(), |address: &str| {
        BoshCli::new(address)
    });
    let report = pipeline.run().await?;

    eprintln!("{}", formatter.format_apply(&report));
    Ok(())
}

/// Tear the environment down.
async fn cmd_down(state_dir: &Path, auto_approve: bool, formatter: &OutputFormatter) -> Result<()> {
    let state_file = StateFile::new(state_dir);
    let state = state_file.load_required().await?;

    if !auto_approve {
        eprint!(
            "This will destroy environment '{}' and its infrastructure. Continue? [y/N]: ",
            state.env_id
        );
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Down cancelled.");
            return Ok(());
        }
    }

    let store = ArtifactStore::new(state_dir);
    let report = TeardownPipeline::new(store, TerraformCli::new()).run().await?;

    eprintln!("{}", formatter.format_teardown(&report));
    Ok(())
}

/// Show load-balancer endpoints.
async fn cmd_lbs(state_dir: &Path, formatter: &OutputFormatter) -> Result<()> {
    let state = StateFile::new(state_dir).load_required().await?;
    let endpoints = EndpointReporter::new().resolve(&state)?;

    eprintln!("{}", formatter.format_endpoints(&endpoints));
    Ok(())
}

/// Print the reconciled cloud configuration without uploading it.
async fn cmd_cloud_config(state_dir: &Path) -> Result<()> {
    let state = StateFile::new(state_dir).load_required().await?;

    let store = ArtifactStore::new(state_dir);
    let base = store
        .read(templates::CLOUD_CONFIG_BASE_PATH)
        .await?
        .ok_or_else(|| {
            PlinthError::internal("no cloud config artifact found; run 'plinth plan' first")
        })?;

    let lb_types: Vec<LbType> = state.load_balancers.iter().map(|lb| lb.lb_type).collect();
    let document = render_merged(&base, state.iaas, &lb_types, &state.env_id)?;

    print!("{}", document.to_yaml()?);
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Builds an environment configuration from CLI arguments.
fn build_config(
    state_dir: &Path,
    name: &str,
    iaas: &str,
    lb_types: &[String],
    lb_cert: Option<PathBuf>,
    lb_key: Option<PathBuf>,
) -> Result<EnvironmentConfig> {
    let iaas: Iaas = iaas.parse().map_err(PlinthError::Declaration)?;

    let mut config = EnvironmentConfig::new(name, iaas, state_dir);
    for raw in lb_types {
        let lb_type: LbType = raw.parse().map_err(PlinthError::Declaration)?;
        let lb = if lb_type.requires_certificate() {
            match (&lb_cert, &lb_key) {
                (Some(cert), Some(key)) => LoadBalancer::with_certificate(lb_type, cert, key),
                _ => LoadBalancer::new(lb_type),
            }
        } else {
            LoadBalancer::new(lb_type)
        };
        config = config.with_load_balancer(lb);
    }

    Ok(config)
}
