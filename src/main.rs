//! cou - Charmed OpenStack cloud upgrade tool.
//!
//! Plans and runs the upgrade of a cloud to its next release:
//! - Release analysis of every OpenStack application in the model
//! - Per-application upgrade plans grouped by role
//! - Sequential execution with concurrent per-unit package upgrades

mod actions;
mod analysis;
mod apps;
mod ceph;
mod config;
mod error;
mod juju;
mod openstack;
mod output;
mod steps;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use colored::Colorize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error};

use analysis::Analysis;
use config::{Args, Config};
use error::{CouError, Failure};
use juju::ControlPlane;
use juju::cli::JujuCli;
use openstack::Catalog;
use steps::RunContext;
use steps::plan::{PlanOptions, data_plane_warning, generate_plan};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    let config = Config::from_args(args);

    // Initialize logging
    if let Err(e) = init_tracing(&config.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    debug!("Starting cou - Charmed OpenStack Upgrade Tool");

    if let Err(failure) = run(&config).await {
        match &failure {
            Failure::Cancelled => println!("{}", failure.to_string().yellow()),
            _ => error!("{}", failure),
        }
        std::process::exit(failure.exit_code());
    }
}

/// Initialize tracing subscriber.
fn init_tracing(log_level: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to initialize log filter: {}", e))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

/// Main application logic.
async fn run(config: &Config) -> Result<(), Failure> {
    let catalog = match &config.catalog {
        Some(path) => Catalog::load(path),
        None => Catalog::embedded(),
    }
    .map_err(Failure::Planning)?;

    let (client, analysis) = connect_and_analyze(config, &catalog)
        .await
        .map_err(Failure::Planning)?;
    output::print_applications(&analysis);

    let options = PlanOptions {
        backup: config.backup,
    };
    let plan = match generate_plan(&analysis, &catalog, &options) {
        Ok(plan) => plan,
        Err(e) => {
            if let Some(err @ CouError::HighestReleaseAchieved { .. }) =
                e.downcast_ref::<CouError>()
            {
                println!("{}", format!("{err}. Nothing to upgrade.").green().bold());
                return Ok(());
            }
            return Err(Failure::Planning(e));
        }
    };

    output::print_plan(&plan);
    if let Some(warning) = data_plane_warning(&analysis).map_err(Failure::Planning)? {
        output::print_data_plane_warning(&warning);
    }

    if config.dry_run {
        println!("{}", "[DRY RUN] Upgrade plan generated.".yellow());
        return Ok(());
    }

    if !config.yes {
        let proceed = Confirm::new()
            .with_prompt("Would you like to start the upgrade?")
            .default(false)
            .interact()
            .context("Failed to read confirmation")
            .map_err(Failure::Planning)?;
        if !proceed {
            return Err(Failure::Cancelled);
        }
    }

    let started_at = Local::now();
    let ctx = RunContext::new(&client, &catalog);
    plan.execute(&ctx).await.map_err(Failure::Execution)?;
    output::print_completion(started_at);

    Ok(())
}

/// Connect to the model and analyze its applications.
async fn connect_and_analyze(config: &Config, catalog: &Catalog) -> Result<(JujuCli, Analysis)> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Connecting to the model...");

    let result = async {
        let client = JujuCli::connect(config.model.as_deref()).await?;
        pb.set_message(format!("Analyzing model {}...", client.model_name()));
        let status = client.model_status().await?;
        Ok::<_, anyhow::Error>((client, status))
    }
    .await;
    pb.finish_and_clear();

    let (client, status) = result?;
    let analysis = Analysis::from_status(&status, catalog);
    Ok((client, analysis))
}
