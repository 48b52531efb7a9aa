use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trip_duration_trainer::{run_training, TrainConfig};

/// Trains the trip duration regression model from a CSV dataset.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// CSV file with the trip records
    training_data_path: PathBuf,

    /// Text file the evaluation report is appended to
    train_info_output_filepath: PathBuf,

    /// Directory the model is written to, replaced if it exists
    duration_model_path_to_save: PathBuf,

    /// TOML file overriding the default training configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the train/test split
    #[arg(long)]
    seed: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = err.print();
            eprintln!("Error: Wrong parameter specification!");
            eprintln!(
                "Your command should be something like:\n{} <training-data-path> <train-info-output-filepath> <duration-model-path-to-save>",
                env!("CARGO_PKG_NAME")
            );
            return Ok(ExitCode::FAILURE);
        }
    };

    if !cli.training_data_path.exists() {
        eprintln!("Error: training-data-filepath doesn't exist! You must specify a valid one!");
        return Ok(ExitCode::FAILURE);
    }

    init_tracing(cli.verbose, cli.quiet);
    info!("Starting training job...");

    let mut config = match &cli.config {
        Some(path) => TrainConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => TrainConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.split.seed = seed;
    }

    let outcome = run_training(
        &cli.training_data_path,
        &cli.train_info_output_filepath,
        &cli.duration_model_path_to_save,
        &config,
    )
    .context("training job failed")?;

    info!(
        rmse = outcome.metrics.rmse,
        mae = outcome.metrics.mae,
        r2 = outcome.metrics.r2,
        "training job finished"
    );
    Ok(ExitCode::SUCCESS)
}
