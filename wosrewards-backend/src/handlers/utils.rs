use std::path::Path;

use serde_json::{json, Value};
use wosrewards_job_queue::{format_timestamp, job_output_dir, Job, JobId, JobStatus};

use crate::error::ApiError;

/// Mount point of the artifact file service, relative to the API root.
pub const JOBS_DATA_ROUTE: &str = "/jobs_data";

pub fn parse_positive_usize(
    raw: Option<&String>,
    fallback: usize,
    field: &str,
) -> Result<usize, ApiError> {
    match raw {
        Some(value) => {
            let parsed = value.parse::<usize>().map_err(|_| {
                ApiError::bad_request(format!("{field} must be a positive integer"))
            })?;
            if parsed == 0 {
                return Err(ApiError::bad_request(format!("{field} must be at least 1")));
            }
            Ok(parsed)
        }
        None => Ok(fallback),
    }
}

pub fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.trim()
        .parse::<JobId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::bad_request(format!("invalid job id: {raw}")))
}

/// Download link for a stored artifact, if the result reference points into
/// the job's own output directory.
///
/// Error and blocked messages are plain text and never get a link.
pub fn artifact_url(job: &Job) -> Option<String> {
    if !matches!(job.status, JobStatus::Done | JobStatus::Blocked) {
        return None;
    }
    let result_ref = job.result_ref.as_deref()?;
    let job_dir = job_output_dir(Path::new(""), job.id);
    let prefix = format!("{}/", job_dir.to_string_lossy());
    if !result_ref.starts_with(&prefix) || result_ref.contains("..") {
        return None;
    }
    Some(format!("/api{JOBS_DATA_ROUTE}/{result_ref}"))
}

pub fn job_to_payload(job: &Job) -> Value {
    json!({
        "id": job.id,
        "playerIds": job.inputs,
        "status": job.status.as_str(),
        "createdAt": format_timestamp(&job.created_at),
        "finishedAt": job.finished_at.as_ref().map(format_timestamp),
        "resultRef": job.result_ref,
        "resultUrl": artifact_url(job),
    })
}
