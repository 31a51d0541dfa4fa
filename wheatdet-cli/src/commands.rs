//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::TrainingArgs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use wheatdet_core::config::{load_config, BootstrapConfig};
use wheatdet_core::pipeline::{Pipeline, Step};
use wheatdet_core::types::RunReport;
use wheatdet_steps::verify::dir_is_populated;
use wheatdet_steps::{DatasetStep, DepsStep, SourceStep, TrainStep, WeightsStep};

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Run { training } => {
            let config = effective_config(workspace, &training)?;
            let mut steps: Vec<Arc<dyn Step>> = vec![Arc::new(DepsStep)];
            if config.source.is_some() || !config.paths.src_dir().is_dir() {
                steps.push(Arc::new(SourceStep));
            }
            steps.push(Arc::new(DatasetStep));
            steps.push(Arc::new(WeightsStep));
            steps.push(Arc::new(TrainStep));
            run_pipeline(config, steps, json).await
        }
        Commands::Deps => {
            let config = effective_config(workspace, &TrainingArgs::default())?;
            run_pipeline(config, vec![Arc::new(DepsStep)], json).await
        }
        Commands::Dataset => {
            let config = effective_config(workspace, &TrainingArgs::default())?;
            run_pipeline(config, vec![Arc::new(DatasetStep)], json).await
        }
        Commands::Weights => {
            let config = effective_config(workspace, &TrainingArgs::default())?;
            run_pipeline(config, vec![Arc::new(WeightsStep)], json).await
        }
        Commands::Train { training } => {
            let config = effective_config(workspace, &training)?;
            run_pipeline(config, vec![Arc::new(TrainStep)], json).await
        }
        Commands::Doctor => {
            let config = effective_config(workspace, &TrainingArgs::default())?;
            handle_doctor(&config)
        }
        Commands::Config { action } => handle_config(action, workspace),
    }
}

/// Load, anchor, override, and validate the configuration.
fn effective_config(workspace: &Path, training: &TrainingArgs) -> anyhow::Result<BootstrapConfig> {
    let mut config = load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // A relative project root is anchored at the workspace, not the cwd.
    if config.paths.root.is_relative() {
        config.paths.root = workspace.join(&config.paths.root);
    }

    if let Some(epochs) = training.epoch {
        config.training.epochs = epochs;
    }
    if let Some(variant) = &training.model_variant {
        config.training.model_variant = variant.clone();
    }
    if let Some(bs) = training.bs {
        config.training.batch_size = bs;
    }

    config.validate()?;
    debug!(
        root = %config.paths.root.display(),
        variant = %config.training.model_variant,
        "effective configuration"
    );
    Ok(config)
}

async fn run_pipeline(
    config: BootstrapConfig,
    steps: Vec<Arc<dyn Step>>,
    json: bool,
) -> anyhow::Result<()> {
    let mut pipeline = Pipeline::new(config);
    for step in steps {
        pipeline = pipeline.with_step(step);
    }

    let report = pipeline.run().await;
    print_report(&report, json)?;

    if !report.succeeded() {
        anyhow::bail!(
            "bootstrap failed at step '{}': {}",
            report.failed_step.as_deref().unwrap_or("?"),
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_report(report: &RunReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let label = if report.succeeded() { "succeeded" } else { "failed" };
    println!("Run {} ({})", report.run_id, label);
    for step in &report.steps {
        println!(
            "  {:<8} {:<10} {} ({} ms)",
            step.step, step.status, step.detail, step.duration_ms
        );
    }
    Ok(())
}

/// Read-only environment check: reports on every artifact the pipeline
/// produces or consumes, then fails if anything is missing.
fn handle_doctor(config: &BootstrapConfig) -> anyhow::Result<()> {
    let paths = &config.paths;
    let mut problems = Vec::new();

    let mut check = |label: &str, ok: bool, detail: String| {
        println!("  [{}] {:<20} {}", if ok { "ok" } else { "!!" }, label, detail);
        if !ok {
            problems.push(label.to_string());
        }
    };

    let archive = paths.dataset_archive();
    check(
        "dataset archive",
        archive.is_file(),
        archive.display().to_string(),
    );
    let input = paths.input_dir();
    check(
        "input dir",
        dir_is_populated(&input),
        input.display().to_string(),
    );
    let pretrained = paths.pretrained_dir();
    check(
        "pretrained dir",
        dir_is_populated(&pretrained),
        pretrained.display().to_string(),
    );
    let entrypoint = paths.src_dir().join(&config.training.entrypoint);
    check(
        "entrypoint",
        entrypoint.is_file(),
        entrypoint.display().to_string(),
    );

    if problems.is_empty() {
        println!("Environment ready.");
        Ok(())
    } else {
        anyhow::bail!("doctor found problems: {}", problems.join(", "))
    }
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".wheatdet");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let default_config = BootstrapConfig::default();
            let toml_str = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}
