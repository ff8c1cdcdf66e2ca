//! Submission side of the queue: create the record, then enqueue it.

use std::fmt;
use std::sync::Arc;

use crate::error::JobQueueError;
use crate::queue::QueueBackend;
use crate::store::JobStore;
use crate::types::{Job, JobId, JobStatus};

/// Creates jobs and reads their status. Never changes a job's status.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn QueueBackend>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queue", &self.queue.name())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(store: Arc<dyn JobStore>, queue: Arc<dyn QueueBackend>) -> Self {
        Self { store, queue }
    }

    #[inline]
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    #[inline]
    pub fn queue(&self) -> &Arc<dyn QueueBackend> {
        &self.queue
    }

    /// Records a new job and hands its descriptor to the queue.
    ///
    /// The record is created before the enqueue so a descriptor never points
    /// at a missing job. If the enqueue fails the job stays `queued` and the
    /// error is returned; [`Dispatcher::requeue`] can push it again.
    pub async fn submit(&self, inputs: Vec<String>) -> Result<Job, JobQueueError> {
        let inputs = normalize_inputs(inputs);
        if inputs.is_empty() {
            return Err(JobQueueError::InvalidInput(
                "at least one player id is required".into(),
            ));
        }

        let job = self.store.create(inputs).await?;
        if let Err(e) = self.queue.enqueue(&job.descriptor()).await {
            tracing::error!(job_id = job.id, queue = self.queue.name(), error = %e, "failed to enqueue job");
            return Err(e);
        }
        tracing::info!(job_id = job.id, players = job.inputs.len(), queue = self.queue.name(), "job submitted");
        Ok(job)
    }

    pub async fn get_status(&self, id: JobId) -> Result<Job, JobQueueError> {
        self.store.get(id).await?.ok_or(JobQueueError::NotFound(id))
    }

    pub async fn list_jobs(&self, limit: usize, offset: usize) -> Result<Vec<Job>, JobQueueError> {
        self.store.list(limit, offset).await
    }

    pub async fn count_jobs(&self) -> Result<usize, JobQueueError> {
        self.store.count().await
    }

    /// Pushes a fresh descriptor for a job that is still waiting.
    ///
    /// Running and finished jobs are refused so the worker never picks the
    /// same job up twice through this path.
    pub async fn requeue(&self, id: JobId) -> Result<Job, JobQueueError> {
        let job = self.get_status(id).await?;
        match job.status {
            JobStatus::Queued => {}
            JobStatus::Running => return Err(JobQueueError::AlreadyRunning(id)),
            _ => return Err(JobQueueError::AlreadyFinished(id)),
        }
        self.queue.enqueue(&job.descriptor()).await?;
        tracing::info!(job_id = id, queue = self.queue.name(), "job requeued");
        Ok(job)
    }
}

/// Trims each identifier and drops the empty ones. Entries are never split.
pub fn normalize_inputs<I, S>(inputs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    inputs
        .into_iter()
        .filter_map(|raw| {
            let id = raw.as_ref().trim();
            (!id.is_empty()).then(|| id.to_owned())
        })
        .collect()
}
