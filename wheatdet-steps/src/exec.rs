//! Child-process execution with line-streamed output.
//!
//! Steps that shell out (pip, the dataset-host CLI, the trainer itself) run
//! through here: stdout/stderr are forwarded line by line to `tracing`, and a
//! non-zero exit status becomes a `StepError` instead of being ignored the
//! way the original scripts ignored it.

use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use wheatdet_core::error::StepError;

/// Run `program args..` in `cwd`, streaming output and enforcing exit status.
pub async fn run_checked(
    step: &str,
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
) -> Result<(), StepError> {
    debug!(step, program, ?args, "spawning command");

    let mut command = tokio::process::Command::new(program);
    command
        .args(args)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|e| StepError::SpawnFailed {
        step: step.to_string(),
        program: program.to_string(),
        message: e.to_string(),
    })?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let step_out = step.to_string();
    let stdout_task = tokio::spawn(async move {
        if let Some(pipe) = stdout_pipe {
            let mut lines = BufReader::new(pipe).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(step = %step_out, "{}", line);
            }
        }
    });

    let step_err = step.to_string();
    let stderr_task = tokio::spawn(async move {
        if let Some(pipe) = stderr_pipe {
            let mut lines = BufReader::new(pipe).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(step = %step_err, "{}", line);
            }
        }
    });

    let status = child.wait().await.map_err(|e| StepError::SpawnFailed {
        step: step.to_string(),
        program: program.to_string(),
        message: format!("failed waiting for child: {}", e),
    })?;

    let _ = stdout_task.await;
    let _ = stderr_task.await;

    if !status.success() {
        return Err(StepError::CommandFailed {
            step: step.to_string(),
            program: program.to_string(),
            code: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_checked_success() {
        let result = run_checked("deps", "true", &[], None).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_checked_nonzero_exit() {
        let err = run_checked("deps", "false", &[], None).await.unwrap_err();
        match err {
            StepError::CommandFailed { step, code, .. } => {
                assert_eq!(step, "deps");
                assert_eq!(code, 1);
            }
            e => panic!("expected CommandFailed, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_run_checked_missing_program() {
        let err = run_checked("deps", "wheatdet-no-such-binary", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_run_checked_respects_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let result = run_checked(
            "train",
            "sh",
            &["-c".to_string(), "test -f marker.txt".to_string()],
            Some(dir.path()),
        )
        .await;
        assert!(result.is_ok());
    }
}
