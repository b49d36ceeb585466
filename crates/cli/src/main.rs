//! RUL Predictor CLI
//!
//! A command-line tool for preparing run-to-failure data, training and
//! evaluating the RUL model, and serving predictions from its artifact.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{pipeline, predict};
use rul_lib::artifact::LoadedArtifact;
use rul_lib::{ArtifactLocation, ModelArtifact, PipelineConfig};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// RUL Predictor CLI
#[derive(Parser)]
#[command(name = "rul")]
#[command(author, version, about = "CLI for the Remaining Useful Life predictor", long_about = None)]
pub struct Cli {
    /// Config file (defaults to ./rul.toml when present)
    #[arg(long, short, env = "RUL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest and label the training log
    Prepare,

    /// Prepare, then rank and select features
    Select,

    /// Run the full train/eval pipeline and save the model artifact
    Train,

    /// Evaluate an existing artifact against the test log and ground truth
    Evaluate {
        /// Artifact path (defaults to the configured artifact location)
        #[arg(long, short)]
        artifact: Option<PathBuf>,
    },

    /// Predict RUL from a CSV file and/or individual feature values
    Predict {
        /// CSV file with a header row of feature names
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Feature value as name=value (repeatable)
        #[arg(long = "feature", value_name = "NAME=VALUE")]
        features: Vec<String>,

        /// Artifact path (defaults to the configured artifact location)
        #[arg(long, short)]
        artifact: Option<PathBuf>,

        /// Print Prometheus metrics after predicting
        #[arg(long)]
        emit_metrics: bool,
    },

    /// Show an artifact's feature order and training metadata
    Inspect {
        /// Artifact path (defaults to the configured artifact location)
        #[arg(long, short)]
        artifact: Option<PathBuf>,
    },

    /// Write a sample input CSV matching an artifact's feature order
    Sample {
        /// Artifact path (defaults to the configured artifact location)
        #[arg(long, short)]
        artifact: Option<PathBuf>,

        /// Output file
        #[arg(long, short, default_value = "sample_sensor_input.csv")]
        output: PathBuf,

        /// Number of rows
        #[arg(long, default_value_t = 2)]
        rows: usize,
    },
}

fn init_tracing(verbose: bool, log_json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolve and load the artifact named on the command line or in the config
pub(crate) async fn load_artifact(config: &PipelineConfig, artifact: Option<&Path>) -> Result<LoadedArtifact> {
    let location = match artifact {
        Some(path) => ArtifactLocation::local(path),
        None => config.artifact_location()?,
    };
    let path = location
        .resolve()
        .await
        .with_context(|| format!("Failed to resolve artifact {}", location.path().display()))?;
    debug!(path = %path.display(), "Resolved artifact location");
    ModelArtifact::load(&path, config.artifact.encoding)
        .with_context(|| format!("Failed to load artifact {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config = PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Prepare => pipeline::prepare(&config, cli.format)?,
        Commands::Select => pipeline::select(&config, cli.format)?,
        Commands::Train => pipeline::train(&config, cli.format)?,
        Commands::Evaluate { artifact } => {
            pipeline::evaluate(&config, artifact.as_deref(), cli.format).await?;
        }
        Commands::Predict {
            input,
            features,
            artifact,
            emit_metrics,
        } => {
            predict::predict(
                &config,
                artifact.as_deref(),
                input.as_deref(),
                &features,
                emit_metrics,
                cli.format,
            )
            .await?;
        }
        Commands::Inspect { artifact } => {
            predict::inspect(&config, artifact.as_deref(), cli.format).await?;
        }
        Commands::Sample {
            artifact,
            output,
            rows,
        } => {
            predict::sample(&config, artifact.as_deref(), &output, rows, cli.format).await?;
        }
    }

    Ok(())
}
