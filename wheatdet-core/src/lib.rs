//! # Wheatdet Core
//!
//! Core library for the wheatdet bootstrap tool.
//! Provides the configuration system, the error taxonomy, and the
//! sequential fail-fast pipeline engine that drives the bootstrap steps.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{
    config_exists, load_config, BootstrapConfig, DepsConfig, PathsConfig, SourceConfig,
    TorchPin, TrainingConfig, WeightsConfig, WeightsSource,
};
pub use error::{ConfigError, Result, StepError, WheatdetError};
pub use pipeline::{Pipeline, Step, StepContext};
pub use types::{RunReport, RunStatus, StepReport, StepStatus};
