//! The JSON line an automation command prints as its last stdout line.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use wosrewards_job_queue::{ExecutionOutcome, STATUS_FILE_NAME};

use crate::error::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Blocked,
    Error,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorReport {
    pub status: ReportStatus,
    #[serde(default)]
    pub artifact_path: Option<PathBuf>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ExecutorReport {
    /// Reads the report from the last non-empty line of `stdout`.
    pub fn from_stdout(stdout: &str) -> Result<Self, JobError> {
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| JobError::InvalidReport("command printed no report".into()))?;
        serde_json::from_str(line).map_err(|e| JobError::InvalidReport(format!("{e}: {line}")))
    }

    /// Maps the report onto the worker's outcome.
    ///
    /// Relative artifact paths are taken relative to `output_dir`; a success
    /// without a path points at the status sheet in `output_dir`.
    pub fn into_outcome(self, output_dir: &Path) -> Result<ExecutionOutcome, JobError> {
        let resolve = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                output_dir.join(path)
            }
        };

        match self.status {
            ReportStatus::Success => Ok(ExecutionOutcome::Success {
                artifact_path: self
                    .artifact_path
                    .map(resolve)
                    .unwrap_or_else(|| output_dir.join(STATUS_FILE_NAME)),
            }),
            ReportStatus::Blocked => Ok(ExecutionOutcome::Blocked {
                message: self
                    .message
                    .unwrap_or_else(|| "blocked by the target site".into()),
                artifact_path: self.artifact_path.map(resolve),
            }),
            ReportStatus::Error => Err(JobError::Reported(
                self.message
                    .unwrap_or_else(|| "executor reported an error".into()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_non_empty_line_wins() {
        let stdout = "opening browser\n{\"status\":\"blocked\",\"message\":\"captcha\"}\n\n";
        let report = ExecutorReport::from_stdout(stdout).unwrap();
        assert_eq!(report.status, ReportStatus::Blocked);
        assert_eq!(report.message.as_deref(), Some("captcha"));
    }

    #[test]
    fn missing_or_garbled_report_is_invalid() {
        assert!(matches!(
            ExecutorReport::from_stdout("\n  \n"),
            Err(JobError::InvalidReport(_))
        ));
        assert!(matches!(
            ExecutorReport::from_stdout("done!"),
            Err(JobError::InvalidReport(_))
        ));
    }

    #[test]
    fn relative_artifacts_resolve_against_output_dir() {
        let report = ExecutorReport::from_stdout(
            r#"{"status":"success","artifact_path":"task_status.csv"}"#,
        )
        .unwrap();
        let outcome = report.into_outcome(Path::new("/data/job_4")).unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Success {
                artifact_path: PathBuf::from("/data/job_4/task_status.csv")
            }
        );
    }

    #[test]
    fn success_defaults_to_status_sheet() {
        let report = ExecutorReport::from_stdout(r#"{"status":"success"}"#).unwrap();
        let outcome = report.into_outcome(Path::new("/data/job_5")).unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Success {
                artifact_path: PathBuf::from("/data/job_5").join(STATUS_FILE_NAME)
            }
        );
    }

    #[test]
    fn reported_error_carries_message() {
        let report =
            ExecutorReport::from_stdout(r#"{"status":"error","message":"login expired"}"#).unwrap();
        let err = report.into_outcome(Path::new("/data/job_6")).unwrap_err();
        assert_eq!(err.to_string(), "login expired");
    }
}
