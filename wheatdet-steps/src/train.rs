//! Training invoker step.
//!
//! Launches the external training entry point from inside the source
//! directory with the three-flag contract `--epoch=<n> --model-variant=<v>
//! --bs=<n>`. Before spawning, it verifies the artifacts earlier steps were
//! supposed to leave behind, and afterwards the child's exit status is
//! propagated instead of dropped.

use async_trait::async_trait;
use tracing::info;

use wheatdet_core::config::TrainingConfig;
use wheatdet_core::error::StepError;
use wheatdet_core::pipeline::{Step, StepContext};
use wheatdet_core::types::StepReport;

use crate::exec::run_checked;
use crate::verify::{require_file, require_populated};

pub const STEP_NAME: &str = "train";

/// Argument vector for the training entry point.
///
/// Exactly three standard flags, in this order, then any extras verbatim.
pub fn command_args(training: &TrainingConfig) -> Vec<String> {
    let mut args = vec![
        format!("--epoch={}", training.epochs),
        format!("--model-variant={}", training.model_variant),
        format!("--bs={}", training.batch_size),
    ];
    args.extend(training.extra_args.iter().cloned());
    args
}

/// The full invocation line as it would appear in a shell.
pub fn command_line(training: &TrainingConfig) -> String {
    let mut line = training.entrypoint.clone();
    for arg in command_args(training) {
        line.push(' ');
        line.push_str(&arg);
    }
    line
}

/// Runs the training entry point and propagates its exit status.
pub struct TrainStep;

#[async_trait]
impl Step for TrainStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn description(&self) -> &str {
        "Invoke the external training entry point with the configured parameters"
    }

    async fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let paths = &ctx.config.paths;
        let training = &ctx.config.training;
        let src_dir = paths.src_dir();
        let entrypoint = src_dir.join(&training.entrypoint);

        // Pre-flight: the invariant the original scripts never checked.
        require_file(STEP_NAME, &entrypoint)?;
        require_populated(STEP_NAME, &paths.input_dir(), "dataset")?;
        require_populated(STEP_NAME, &paths.pretrained_dir(), "pretrained weights")?;

        let mut args = vec![training.entrypoint.clone()];
        args.extend(command_args(training));

        info!(command = %command_line(training), cwd = %src_dir.display(), "launching training");
        run_checked(STEP_NAME, &ctx.config.deps.python_bin, &args, Some(&src_dir)).await?;

        Ok(StepReport::completed(
            STEP_NAME,
            format!("{} finished with exit status 0", command_line(training)),
        ))
    }
}
