//! Dependency installer step.
//!
//! Installs the declared python package manifest with `<python> -m pip`.
//! The manifest is configuration, not script literals: packages carry their
//! pins, and the optional torch pin brings its own wheel index so the exact
//! CUDA build the weights were trained against is reproducible.

use async_trait::async_trait;

use wheatdet_core::config::DepsConfig;
use wheatdet_core::error::StepError;
use wheatdet_core::pipeline::{Step, StepContext};
use wheatdet_core::types::StepReport;

use crate::exec::run_checked;

pub const STEP_NAME: &str = "deps";

/// Build the pip invocations for a manifest, in execution order.
///
/// Each element is one argument vector passed to `python_bin`. The torch pin
/// installs first so the manifest packages resolve against it rather than
/// pulling in an arbitrary torch.
pub fn pip_invocations(deps: &DepsConfig) -> Vec<Vec<String>> {
    let mut invocations = Vec::new();

    if deps.upgrade_pip {
        invocations.push(
            ["-m", "pip", "install", "--upgrade", "pip"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
    }

    if let Some(pin) = &deps.torch {
        let mut args: Vec<String> = ["-m", "pip", "install"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(format!("torch=={}", pin.torch));
        args.push(format!("torchvision=={}", pin.torchvision));
        if let Some(index) = &pin.index_url {
            args.push("-f".to_string());
            args.push(index.clone());
        }
        invocations.push(args);
    }

    if !deps.packages.is_empty() {
        let mut args: Vec<String> = ["-m", "pip", "install"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.extend(deps.packages.iter().cloned());
        invocations.push(args);
    }

    invocations
}

/// Installs the python dependency manifest, failing fast on any pip error.
pub struct DepsStep;

#[async_trait]
impl Step for DepsStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn description(&self) -> &str {
        "Install the declared python package manifest via pip"
    }

    async fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let deps = &ctx.config.deps;
        let invocations = pip_invocations(deps);
        if invocations.is_empty() {
            return Ok(StepReport::skipped(STEP_NAME, "empty package manifest"));
        }

        for args in &invocations {
            run_checked(STEP_NAME, &deps.python_bin, args, None).await?;
        }

        let pinned = deps.torch.is_some();
        Ok(StepReport::completed(
            STEP_NAME,
            format!(
                "installed {} packages{}",
                deps.packages.len(),
                if pinned { " plus pinned torch/torchvision" } else { "" }
            ),
        ))
    }
}
