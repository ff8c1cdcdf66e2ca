//! Job execution errors.

use thiserror::Error;
use wosrewards_job_queue::ExecutorError;

/// Errors that may occur while running the automation command.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    CommandFailed(String),

    #[error("invalid executor report: {0}")]
    InvalidReport(String),

    /// The command ran but reported a failure of its own.
    #[error("{0}")]
    Reported(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<JobError> for ExecutorError {
    fn from(err: JobError) -> Self {
        ExecutorError::Failed(err.to_string())
    }
}
