//! Executor contract consumed by the worker.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;

/// File the executors write their per-player status rows to.
pub const STATUS_FILE_NAME: &str = "task_status.csv";

/// Result of a run that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExecutionOutcome {
    Success {
        artifact_path: PathBuf,
    },
    /// The target needed interaction the executor could not complete.
    Blocked {
        message: String,
        artifact_path: Option<PathBuf>,
    },
}

/// Performs the side-effecting work for one job.
///
/// The worker calls executors one job at a time, so implementations may hold
/// exclusive external resources.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Run the job for `inputs`, writing any artifacts into `output_dir`.
    async fn run(
        &self,
        inputs: &[String],
        output_dir: &Path,
    ) -> Result<ExecutionOutcome, ExecutorError>;
}

/// An executor that performs no external action.
///
/// It writes an empty status sheet so the job still has an artifact to
/// serve. Used when no automation command is configured.
#[derive(Debug, Default, Clone)]
pub struct NoOpExecutor;

impl NoOpExecutor {
    pub const NAME: &'static str = "noop";
    pub const STATUS_HEADER: &'static str = "player_id,status\n";
}

#[async_trait]
impl JobExecutor for NoOpExecutor {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(
        &self,
        _inputs: &[String],
        output_dir: &Path,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        let artifact_path = output_dir.join(STATUS_FILE_NAME);
        tokio::fs::write(&artifact_path, Self::STATUS_HEADER)
            .await
            .map_err(|e| {
                ExecutorError::io(format!("failed to write {}", artifact_path.display()), e)
            })?;
        Ok(ExecutionOutcome::Success { artifact_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_writes_status_header() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = NoOpExecutor
            .run(&["111".to_string()], dir.path())
            .await
            .unwrap();

        let expected = dir.path().join(STATUS_FILE_NAME);
        assert_eq!(
            outcome,
            ExecutionOutcome::Success {
                artifact_path: expected.clone()
            }
        );
        assert_eq!(
            std::fs::read_to_string(expected).unwrap(),
            NoOpExecutor::STATUS_HEADER
        );
    }

    #[tokio::test]
    async fn noop_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let err = NoOpExecutor.run(&[], &missing).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Io { .. }));
    }
}
