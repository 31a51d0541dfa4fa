//! Pipeline engine — runs bootstrap steps strictly in order, halting on the
//! first failure and recording a per-step report.
//!
//! The setup scripts this replaces would barrel on after a failed unzip or
//! pip install; here every step is a fallible operation and a failure stops
//! the run before the next step can observe a half-materialized environment.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::BootstrapConfig;
use crate::error::StepError;
use crate::types::{RunReport, RunStatus, StepReport, StepStatus};

/// Shared, read-only context handed to every step.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub config: BootstrapConfig,
}

impl StepContext {
    pub fn new(config: BootstrapConfig) -> Self {
        Self { config }
    }
}

/// A single bootstrap operation.
///
/// Implementations live in `wheatdet-steps`; the engine only cares that a
/// step has a name and can fail.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn run(&self, ctx: &StepContext) -> Result<StepReport, StepError>;
}

/// An ordered sequence of steps executed fail-fast.
pub struct Pipeline {
    ctx: StepContext,
    steps: Vec<Arc<dyn Step>>,
}

impl Pipeline {
    pub fn new(config: BootstrapConfig) -> Self {
        Self {
            ctx: StepContext::new(config),
            steps: Vec::new(),
        }
    }

    /// Append a step; steps run in insertion order.
    pub fn with_step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run all steps in order. The first `Err` stops the run: no later step
    /// executes, and the report carries the failing step's name and error.
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = chrono::Utc::now();
        let mut reports = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            info!(step = step.name(), "starting step");
            let clock = Instant::now();

            match step.run(&self.ctx).await {
                Ok(mut report) => {
                    report.duration_ms = clock.elapsed().as_millis() as u64;
                    info!(
                        step = step.name(),
                        status = %report.status,
                        detail = %report.detail,
                        duration_ms = report.duration_ms,
                        "step finished"
                    );
                    reports.push(report);
                }
                Err(e) => {
                    let duration_ms = clock.elapsed().as_millis() as u64;
                    error!(step = step.name(), error = %e, "step failed, halting run");
                    reports.push(StepReport {
                        step: step.name().to_string(),
                        status: StepStatus::Failed,
                        detail: e.to_string(),
                        duration_ms,
                    });
                    return RunReport {
                        run_id,
                        status: RunStatus::Failed,
                        started_at,
                        finished_at: chrono::Utc::now(),
                        steps: reports,
                        failed_step: Some(step.name().to_string()),
                        error: Some(e.to_string()),
                    };
                }
            }
        }

        RunReport {
            run_id,
            status: RunStatus::Succeeded,
            started_at,
            finished_at: chrono::Utc::now(),
            steps: reports,
            failed_step: None,
            error: None,
        }
    }
}
