//! Error types for the job queue system.

use std::time::Duration;

use thiserror::Error;

use crate::types::{JobId, JobStatus};

/// Errors that may occur while interacting with the job store or a queue backend.
#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("job store is unavailable: {0}")]
    StoreUnavailable(String),

    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("queue backend is unavailable: {0}")]
    QueueUnavailable(String),

    #[error("invalid job input: {0}")]
    InvalidInput(String),

    #[error("job {0} is already running")]
    AlreadyRunning(JobId),

    #[error("job {0} has already finished")]
    AlreadyFinished(JobId),
}

impl JobQueueError {
    /// Infrastructure failures that may clear up on retry.
    #[inline]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::QueueUnavailable(_))
    }
}

/// Failure reported by an executor run. Recorded as the job's `error` result.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("{0}")]
    Failed(String),

    #[error("executor timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExecutorError {
    #[inline]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    #[inline]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
