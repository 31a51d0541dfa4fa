//! Dataset materializer step.
//!
//! Extracts the dataset archive into the `input` directory. A missing
//! archive stops the run immediately rather than letting training start
//! against an empty directory.

use async_trait::async_trait;
use tracing::info;

use wheatdet_core::error::StepError;
use wheatdet_core::pipeline::{Step, StepContext};
use wheatdet_core::types::StepReport;

use crate::archive::extract_zip;
use crate::verify::require_populated;

pub const STEP_NAME: &str = "dataset";

/// Materializes the dataset from its zip archive into `paths.input_dir`.
pub struct DatasetStep;

#[async_trait]
impl Step for DatasetStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn description(&self) -> &str {
        "Extract the dataset archive into the input directory"
    }

    async fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError> {
        let archive = ctx.config.paths.dataset_archive();
        let input_dir = ctx.config.paths.input_dir();

        info!(archive = %archive.display(), dest = %input_dir.display(), "materializing dataset");
        let extracted = extract_zip(STEP_NAME, &archive, &input_dir)?;
        require_populated(STEP_NAME, &input_dir, "dataset")?;

        Ok(StepReport::completed(
            STEP_NAME,
            format!("extracted {} files into {}", extracted, input_dir.display()),
        ))
    }
}
