//! Artifact verification helpers.
//!
//! The original setup never checked that its outputs existed before training
//! started; every materializer here verifies its destination, and the doctor
//! command reuses the same checks.

use std::path::Path;

use wheatdet_core::error::StepError;

/// Whether `dir` exists and contains at least one entry.
pub fn dir_is_populated(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Fail with `VerificationFailed` unless `dir` exists and is non-empty.
pub fn require_populated(step: &str, dir: &Path, what: &str) -> Result<(), StepError> {
    if dir_is_populated(dir) {
        Ok(())
    } else {
        Err(StepError::VerificationFailed {
            step: step.to_string(),
            reason: format!("{} directory {} is missing or empty", what, dir.display()),
        })
    }
}

/// Fail with `MissingArtifact` unless `file` exists.
pub fn require_file(step: &str, file: &Path) -> Result<(), StepError> {
    if file.is_file() {
        Ok(())
    } else {
        Err(StepError::MissingArtifact {
            step: step.to_string(),
            path: file.to_path_buf(),
        })
    }
}
