//! Configuration system for wheatdet.
//!
//! Uses `figment` for layered configuration: defaults -> config file ->
//! environment -> CLI overrides. Configuration is loaded from
//! `~/.config/wheatdet/config.toml` and/or `.wheatdet/config.toml` in the
//! workspace directory.
//!
//! Every path the original setup scripts hard-coded (the mounted-drive
//! archive location, the `input`, `pretrained_models`, and `src` directories)
//! is a named field here, validated before any step runs.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Top-level configuration for a bootstrap run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub paths: PathsConfig,
    pub deps: DepsConfig,
    pub weights: WeightsConfig,
    pub training: TrainingConfig,
    /// Optional training-source provisioning (clone when `src` is absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,
}

/// Filesystem layout for a run. Relative directories resolve against `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Project root; all relative paths below resolve against it.
    pub root: PathBuf,
    /// Zip archive holding the dataset (images + annotations).
    pub dataset_archive: PathBuf,
    /// Destination directory for the extracted dataset.
    pub input_dir: PathBuf,
    /// Destination directory for the extracted pretrained weights.
    pub pretrained_dir: PathBuf,
    /// Directory holding the training source (`train.py` and friends).
    pub src_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            dataset_archive: PathBuf::from("global-wheat-detection.zip"),
            input_dir: PathBuf::from("input"),
            pretrained_dir: PathBuf::from("pretrained_models"),
            src_dir: PathBuf::from("src"),
        }
    }
}

impl PathsConfig {
    /// Resolve a configured path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn dataset_archive(&self) -> PathBuf {
        self.resolve(&self.dataset_archive)
    }

    pub fn input_dir(&self) -> PathBuf {
        self.resolve(&self.input_dir)
    }

    pub fn pretrained_dir(&self) -> PathBuf {
        self.resolve(&self.pretrained_dir)
    }

    pub fn src_dir(&self) -> PathBuf {
        self.resolve(&self.src_dir)
    }
}

/// The declared python dependency manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepsConfig {
    /// Interpreter used for `-m pip` and for launching the entrypoint.
    pub python_bin: String,
    /// Packages to install, optionally pinned as `name==version`.
    pub packages: Vec<String>,
    /// Optional pinned torch/torchvision build with its wheel index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torch: Option<TorchPin>,
    /// Upgrade pip itself before installing the manifest.
    pub upgrade_pip: bool,
}

impl Default for DepsConfig {
    fn default() -> Self {
        Self {
            python_bin: "python".to_string(),
            packages: vec![
                "effdet==0.2.4".to_string(),
                "timm==0.4.12".to_string(),
                "omegaconf==2.1.1".to_string(),
                "pycocotools==2.0.2".to_string(),
            ],
            torch: None,
            upgrade_pip: false,
        }
    }
}

/// A pinned torch/torchvision pair and the wheel index that serves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorchPin {
    pub torch: String,
    pub torchvision: String,
    /// `-f` wheel index URL for the pinned CUDA build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_url: Option<String>,
}

/// Where the pretrained-weights archive comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightsSource {
    /// The archive must already exist at `weights.archive`.
    Local,
    /// Direct HTTP(S) download.
    Url { url: String },
    /// Fetched through an external dataset-host CLI by dataset id.
    Dataset { id: String },
}

impl Default for WeightsSource {
    fn default() -> Self {
        WeightsSource::Local
    }
}

/// Pretrained-weights acquisition and extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsConfig {
    /// Local path of the weights archive (download target or pre-existing).
    pub archive: PathBuf,
    #[serde(default)]
    pub source: WeightsSource,
    /// Program invoked for the `dataset` source variant.
    #[serde(default = "default_dataset_cli")]
    pub dataset_cli: String,
    /// Optional sha256 of the archive, checked after acquisition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

fn default_dataset_cli() -> String {
    "kaggle".to_string()
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            archive: PathBuf::from("efficientdet_pretrained.zip"),
            source: WeightsSource::Local,
            dataset_cli: default_dataset_cli(),
            sha256: None,
        }
    }
}

/// Parameters for the training invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: u32,
    /// EfficientDet variant identifier, `d0` through `d7`.
    pub model_variant: String,
    pub batch_size: u32,
    /// Entry point launched inside `src_dir`.
    pub entrypoint: String,
    /// Extra flags appended verbatim after the three standard ones.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 40,
            model_variant: "d0".to_string(),
            batch_size: 4,
            entrypoint: "train.py".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Optional git provisioning of the training source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Repository cloned into `src_dir` when that directory is absent.
    pub repo: String,
    /// Branch or tag to check out; defaults to the remote HEAD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

const MODEL_VARIANTS: [&str; 8] = ["d0", "d1", "d2", "d3", "d4", "d5", "d6", "d7"];

impl BootstrapConfig {
    /// Validate the configuration before any step runs.
    ///
    /// Catches the argument-range mistakes the shell scripts would have
    /// shipped straight into `train.py`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.training.epochs == 0 {
            return Err(ConfigError::Invalid {
                message: "training.epochs must be at least 1".into(),
            });
        }
        if self.training.batch_size == 0 {
            return Err(ConfigError::Invalid {
                message: "training.batch_size must be at least 1".into(),
            });
        }
        if !MODEL_VARIANTS.contains(&self.training.model_variant.as_str()) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "training.model_variant must be one of d0..d7, got '{}'",
                    self.training.model_variant
                ),
            });
        }
        if self.training.entrypoint.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "training.entrypoint".into(),
            });
        }
        if self.deps.python_bin.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "deps.python_bin".into(),
            });
        }
        if let WeightsSource::Url { url } = &self.weights.source {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid {
                    message: format!("weights.source.url must be http(s), got '{}'", url),
                });
            }
        }
        if matches!(self.weights.source, WeightsSource::Dataset { .. })
            && self.weights.dataset_cli.trim().is_empty()
        {
            return Err(ConfigError::MissingField {
                field: "weights.dataset_cli".into(),
            });
        }
        Ok(())
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `WHEATDET_`)
/// 3. Workspace-local config (`.wheatdet/config.toml`)
/// 4. User config (`~/.config/wheatdet/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&BootstrapConfig>,
) -> Result<BootstrapConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(BootstrapConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "wheatdet", "wheatdet") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".wheatdet").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (WHEATDET_TRAINING__EPOCHS, WHEATDET_PATHS__ROOT, etc.)
    figment = figment.merge(Env::prefixed("WHEATDET_").split("__"));

    // Explicit overrides
    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Check whether any wheatdet configuration file exists (user-level or
/// workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "wheatdet", "wheatdet") {
        if config_dir.config_dir().join("config.toml").exists() {
            return true;
        }
    }

    if let Some(ws) = workspace {
        if ws.join(".wheatdet").join("config.toml").exists() {
            return true;
        }
    }

    false
}
