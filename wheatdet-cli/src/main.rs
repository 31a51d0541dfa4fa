//! Wheatdet CLI — bootstrap the wheat-head EfficientDet training environment
//! and launch training.
//!
//! The whole pipeline runs with `wheatdet run`; each step is also available
//! as its own subcommand, and `wheatdet doctor` checks the artifacts without
//! side effects.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Wheatdet: fail-fast training-environment bootstrap
#[derive(Parser, Debug)]
#[command(name = "wheatdet", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (where .wheatdet/config.toml is looked up)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Print the run report as JSON instead of the table
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the full bootstrap pipeline: deps, source, dataset, weights, train
    Run {
        #[command(flatten)]
        training: TrainingArgs,
    },
    /// Install the python dependency manifest
    Deps,
    /// Extract the dataset archive into the input directory
    Dataset,
    /// Obtain and extract the pretrained-weights archive
    Weights,
    /// Invoke the training entry point (assumes materialized artifacts)
    Train {
        #[command(flatten)]
        training: TrainingArgs,
    },
    /// Verify the environment without changing anything
    Doctor,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides for the training invocation, mirroring the entry point's flags.
#[derive(clap::Args, Debug, Default, Clone)]
struct TrainingArgs {
    /// Number of training epochs
    #[arg(long)]
    epoch: Option<u32>,

    /// Model variant identifier (d0..d7)
    #[arg(long)]
    model_variant: Option<String>,

    /// Batch size
    #[arg(long)]
    bs: Option<u32>,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default .wheatdet/config.toml into the workspace
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "wheatdet", "wheatdet")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "wheatdet.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    // Resolve workspace
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.json).await
}
