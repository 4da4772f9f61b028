//! Flight On Time CLI
//!
//! Trains artifact bundles from the historical flights dataset, scores
//! flights locally or through the prediction service, and inspects
//! bundles and service health.

mod client;
mod commands;
mod config;
mod dataset;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, inspect, predict, train};
use output::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Flight On Time CLI
#[derive(Parser)]
#[command(name = "ontime")]
#[command(author, version, about = "CLI for the Flight On Time delay predictor", long_about = None)]
pub struct Cli {
    /// Prediction service URL (can also be set via ONTIME_API_URL env var)
    #[arg(long, env = "ONTIME_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Output format [default: table, or default_format from the config file]
    #[arg(long, short, global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model and write an artifact bundle
    Train(train::TrainArgs),

    /// Predict whether a flight will depart late
    Predict(predict::PredictArgs),

    /// Describe an artifact bundle
    Inspect {
        /// Bundle file (defaults to the bundle served by the service)
        #[arg(long)]
        bundle: Option<PathBuf>,
    },

    /// Check the health of the prediction service
    Health,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let user_config = config::Config::load()?;
    let api_url = user_config.resolve_api_url(cli.api_url.as_deref());
    let format = cli
        .format
        .or_else(|| OutputFormat::from_config(user_config.default_format.as_deref()))
        .unwrap_or_default();

    match cli.command {
        Commands::Train(args) => train::run(&args, format)?,
        Commands::Predict(args) => predict::run(&args, &api_url, format).await?,
        Commands::Inspect { bundle } => inspect::run(bundle.as_deref(), &api_url, format).await?,
        Commands::Health => health::run(&api_url, format).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        output::print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}
