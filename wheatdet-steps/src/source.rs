//! Training-source provisioner step.
//!
//! One deployment target ships the training source alongside this tool, the
//! other clones it. Both are covered here: when a repository is configured
//! and the source directory is absent, clone it; when the directory already
//! exists, there is nothing to do.

use async_trait::async_trait;
use tracing::info;

use wheatdet_core::error::StepError;
use wheatdet_core::pipeline::{Step, StepContext};
use wheatdet_core::types::StepReport;

use crate::verify::require_file;

pub const STEP_NAME: &str = "source";

/// Clones the training source into `paths.src_dir` when absent.
pub struct SourceStep;

#[async_trait]
impl Step for SourceStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn description(&self) -> &str {
        "Provision the training source directory (clone if configured and absent)"
    }

    async fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let src_dir = ctx.config.paths.src_dir();
        let entrypoint = src_dir.join(&ctx.config.training.entrypoint);

        if src_dir.is_dir() {
            require_file(STEP_NAME, &entrypoint)?;
            return Ok(StepReport::skipped(
                STEP_NAME,
                format!("{} already present", src_dir.display()),
            ));
        }

        let Some(source) = &ctx.config.source else {
            // No repo configured and no bundled source on disk.
            return Err(StepError::MissingArtifact {
                step: STEP_NAME.to_string(),
                path: src_dir,
            });
        };

        info!(repo = %source.repo, dest = %src_dir.display(), "cloning training source");
        let repo = source.repo.clone();
        let reference = source.reference.clone();
        let dest = src_dir.clone();
        // git2 is blocking; keep it off the runtime threads.
        tokio::task::spawn_blocking(move || {
            let mut builder = git2::build::RepoBuilder::new();
            if let Some(branch) = &reference {
                builder.branch(branch);
            }
            builder.clone(&repo, &dest).map(|_| ())
        })
        .await
        .map_err(|e| StepError::SpawnFailed {
            step: STEP_NAME.to_string(),
            program: "git2".to_string(),
            message: e.to_string(),
        })?
        .map_err(|e| StepError::SpawnFailed {
            step: STEP_NAME.to_string(),
            program: "git2".to_string(),
            message: e.message().to_string(),
        })?;

        require_file(STEP_NAME, &entrypoint)?;
        Ok(StepReport::completed(
            STEP_NAME,
            format!("cloned {} into {}", source.repo, src_dir.display()),
        ))
    }
}
