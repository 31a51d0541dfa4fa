//! Report types for bootstrap runs.
//!
//! A run produces one `RunReport` holding a `StepReport` per executed step.
//! Reports are serde-serializable so the CLI can print them as TOML/JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Outcome of a single bootstrap step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    /// The step had nothing to do (artifacts already in place).
    Skipped,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Skipped => write!(f, "skipped"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Overall outcome of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// Record of one executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub step: String,
    pub status: StepStatus,
    /// Human-readable summary ("extracted 3422 files", "exit status 0", ...).
    pub detail: String,
    pub duration_ms: u64,
}

impl StepReport {
    pub fn completed(step: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            status: StepStatus::Completed,
            detail: detail.into(),
            duration_ms: 0,
        }
    }

    pub fn skipped(step: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            status: StepStatus::Skipped,
            detail: detail.into(),
            duration_ms: 0,
        }
    }
}

/// Record of a whole pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
    /// Name of the step that stopped the run, when `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    /// Rendered error of the failing step, when `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}
