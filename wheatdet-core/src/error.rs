//! Error types for the wheatdet core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering configuration and bootstrap-step failures. Every step in the
//! pipeline surfaces its failure through `StepError`; the shell scripts this
//! tool replaces would have carried on regardless.

use std::path::PathBuf;

/// Top-level error type for the wheatdet core library.
#[derive(Debug, thiserror::Error)]
pub enum WheatdetError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Step error: {0}")]
    Step(#[from] StepError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from bootstrap step execution.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("Step '{step}' requires missing artifact: {path}")]
    MissingArtifact { step: String, path: PathBuf },

    #[error("Step '{step}' failed to spawn '{program}': {message}")]
    SpawnFailed {
        step: String,
        program: String,
        message: String,
    },

    #[error("Step '{step}': '{program}' exited with status {code}")]
    CommandFailed {
        step: String,
        program: String,
        code: i32,
    },

    #[error("Step '{step}' download failed for {url}: {message}")]
    DownloadFailed {
        step: String,
        url: String,
        message: String,
    },

    #[error("Step '{step}' archive error for {path}: {message}")]
    ArchiveFailed {
        step: String,
        path: PathBuf,
        message: String,
    },

    #[error("Step '{step}' checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        step: String,
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Step '{step}' verification failed: {reason}")]
    VerificationFailed { step: String, reason: String },
}

/// A type alias for results using the top-level `WheatdetError`.
pub type Result<T> = std::result::Result<T, WheatdetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = WheatdetError::Config(ConfigError::MissingField {
            field: "training.model_variant".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required field: training.model_variant"
        );
    }

    #[test]
    fn test_error_display_missing_artifact() {
        let err = WheatdetError::Step(StepError::MissingArtifact {
            step: "dataset".into(),
            path: PathBuf::from("/mnt/drive/global-wheat-detection.zip"),
        });
        assert_eq!(
            err.to_string(),
            "Step error: Step 'dataset' requires missing artifact: /mnt/drive/global-wheat-detection.zip"
        );
    }

    #[test]
    fn test_error_display_command_failed() {
        let err = StepError::CommandFailed {
            step: "train".into(),
            program: "python".into(),
            code: 1,
        };
        assert_eq!(err.to_string(), "Step 'train': 'python' exited with status 1");
    }

    #[test]
    fn test_error_display_checksum() {
        let err = StepError::ChecksumMismatch {
            step: "weights".into(),
            path: PathBuf::from("efficientdet_pretrained.zip"),
            expected: "ab".into(),
            actual: "cd".into(),
        };
        assert_eq!(
            err.to_string(),
            "Step 'weights' checksum mismatch for efficientdet_pretrained.zip: expected ab, got cd"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: WheatdetError = io_err.into();
        assert!(matches!(err, WheatdetError::Io(_)));
    }
}
