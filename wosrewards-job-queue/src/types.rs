//! Core types for the job queue system.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the job store; never reused.
pub type JobId = i64;

/// Fixed serialised form of `created_at` / `finished_at`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Current UTC time at the precision the stores persist.
#[inline]
pub fn now_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

#[inline]
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
    Blocked,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        Self::Queued,
        Self::Running,
        Self::Done,
        Self::Error,
        Self::Blocked,
    ];

    /// Returns true if this status represents a terminal state.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Blocked)
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
            Self::Blocked => "blocked",
        }
    }

    /// Whether a record in `self` may be moved to `next`.
    ///
    /// Re-applying the current status is allowed so repeated updates are
    /// harmless; otherwise the only moves are queued to running and running
    /// to one terminal state.
    #[inline]
    pub const fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Queued)
                | (Self::Queued, Self::Running)
                | (Self::Running, Self::Running)
                | (Self::Running, Self::Done | Self::Error | Self::Blocked)
                | (Self::Done, Self::Done)
                | (Self::Error, Self::Error)
                | (Self::Blocked, Self::Blocked)
        )
    }

    /// The statuses a record may currently hold for an update to `next` to be accepted.
    pub const fn allowed_predecessors(next: JobStatus) -> [JobStatus; 2] {
        match next {
            Self::Queued => [Self::Queued, Self::Queued],
            Self::Running => [Self::Queued, Self::Running],
            Self::Done => [Self::Running, Self::Done],
            Self::Error => [Self::Running, Self::Error],
            Self::Blocked => [Self::Running, Self::Blocked],
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_owned()))
    }
}

/// Snapshot of a job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub inputs: Vec<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result_ref: Option<String>,
}

impl Job {
    /// A freshly created, queued job.
    #[inline]
    pub fn new(id: JobId, inputs: Vec<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            inputs,
            status: JobStatus::Queued,
            created_at,
            finished_at: None,
            result_ref: None,
        }
    }

    #[inline]
    pub fn descriptor(&self) -> QueueDescriptor {
        QueueDescriptor::new(self.id, self.inputs.clone())
    }

    /// Applies an update in place, enforcing the status state machine.
    ///
    /// Returns the rejected `(from, to)` pair when the move is not allowed.
    pub(crate) fn apply(&mut self, update: &JobUpdate) -> Result<(), (JobStatus, JobStatus)> {
        if !self.status.can_transition_to(update.status) {
            return Err((self.status, update.status));
        }
        self.status = update.status;
        if update.status.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(update.finished_at.unwrap_or_else(now_timestamp));
        }
        if let Some(result_ref) = &update.result_ref {
            self.result_ref = Some(result_ref.clone());
        }
        Ok(())
    }
}

/// The fields a status update writes. Unset fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: JobStatus,
    /// Only honoured for terminal statuses, and only the first time.
    pub finished_at: Option<DateTime<Utc>>,
    pub result_ref: Option<String>,
}

impl JobUpdate {
    #[inline]
    pub fn status(status: JobStatus) -> Self {
        Self {
            status,
            finished_at: None,
            result_ref: None,
        }
    }

    #[inline]
    pub fn running() -> Self {
        Self::status(JobStatus::Running)
    }

    /// Terminal update stamped with the current time.
    #[inline]
    pub fn finished(status: JobStatus, result_ref: impl Into<String>) -> Self {
        Self {
            status,
            finished_at: Some(now_timestamp()),
            result_ref: Some(result_ref.into()),
        }
    }

    /// The `finished_at` value a store should persist for this update.
    #[inline]
    pub fn effective_finished_at(&self) -> Option<DateTime<Utc>> {
        self.status
            .is_terminal()
            .then(|| self.finished_at.unwrap_or_else(now_timestamp))
    }
}

/// Transit envelope carried by the queue backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDescriptor {
    pub job_id: JobId,
    pub inputs: Vec<String>,
}

impl QueueDescriptor {
    #[inline]
    pub fn new(job_id: JobId, inputs: Vec<String>) -> Self {
        Self { job_id, inputs }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
