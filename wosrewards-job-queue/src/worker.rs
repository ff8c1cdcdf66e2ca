//! The single background worker: dequeue, claim, execute, record.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use wosrewards_config::Config;

use crate::error::{ExecutorError, JobQueueError};
use crate::executor::{ExecutionOutcome, JobExecutor};
use crate::paths::{job_output_dir, relativize};
use crate::queue::QueueBackend;
use crate::store::JobStore;
use crate::types::{Job, JobId, JobStatus, JobUpdate, QueueDescriptor};

/// Upper bound for any retry backoff in the worker.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Shared root; each job writes under `<root>/job_<id>`.
    pub output_root: PathBuf,
    /// Longest single wait inside `dequeue`.
    pub poll_timeout: Duration,
    /// Pause after a poll that returned nothing.
    pub idle_delay: Duration,
    /// Deadline for one executor run.
    pub job_timeout: Duration,
    /// Extra attempts for a store write that failed transiently.
    pub claim_retries: u32,
    pub retry_backoff: Duration,
}

impl WorkerSettings {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            poll_timeout: Duration::from_secs(5),
            idle_delay: Duration::from_millis(500),
            job_timeout: Duration::from_secs(900),
            claim_retries: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            output_root: PathBuf::from(&config.output.directory),
            poll_timeout: config.queue.poll_timeout(),
            idle_delay: Duration::from_millis(config.worker.idle_delay_ms),
            job_timeout: Duration::from_secs(config.worker.job_timeout_secs),
            claim_retries: config.worker.claim_retries,
            retry_backoff: Duration::from_millis(config.worker.retry_backoff_ms),
        }
    }
}

/// What happened to one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The job reached a terminal state.
    Completed(Job),
    /// The job was no longer queued; the executor was not invoked.
    Skipped { job_id: JobId, status: JobStatus },
    /// The job could not be claimed and the descriptor was parked.
    DeadLettered { job_id: JobId, reason: String },
    /// The executor ran but its result could not be written.
    Unrecorded {
        job_id: JobId,
        status: JobStatus,
        error: String,
    },
}

enum ClaimError {
    NotQueued(JobStatus),
    Store(JobQueueError),
}

/// Processes jobs strictly one at a time.
#[derive(Clone)]
pub struct Worker {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn QueueBackend>,
    executor: Arc<dyn JobExecutor>,
    settings: WorkerSettings,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("queue", &self.queue.name())
            .field("executor", &self.executor.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Worker {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn QueueBackend>,
        executor: Arc<dyn JobExecutor>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            store,
            queue,
            executor,
            settings,
        }
    }

    #[inline]
    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Spawns the loop on the current tokio runtime.
    pub fn start(self) -> WorkerHandle {
        let (shutdown, signal) = watch::channel(false);
        let task = tokio::spawn(self.run(signal));
        WorkerHandle { shutdown, task }
    }

    /// Runs until `shutdown` turns true or its sender is dropped.
    ///
    /// A job in progress is always finished before the loop exits.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            queue = self.queue.name(),
            executor = self.executor.name(),
            output_root = %self.settings.output_root.display(),
            "worker started"
        );

        let mut backoff = self.settings.retry_backoff;
        while !*shutdown.borrow() {
            match self.queue.dequeue(self.settings.poll_timeout).await {
                Ok(Some(descriptor)) => {
                    backoff = self.settings.retry_backoff;
                    self.process(descriptor).await;
                }
                Ok(None) => {
                    if pause(self.settings.idle_delay, &mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        queue = self.queue.name(),
                        error = %e,
                        retry_in_ms = backoff.as_millis() as u64,
                        "dequeue failed"
                    );
                    if pause(backoff, &mut shutdown).await {
                        break;
                    }
                    backoff = next_backoff(backoff);
                }
            }
        }

        tracing::info!(queue = self.queue.name(), "worker stopped");
    }

    /// Takes one descriptor through claim, execution and the terminal write.
    ///
    /// Per-job failures end up in the returned outcome and the job record;
    /// they are never propagated.
    pub async fn process(&self, descriptor: QueueDescriptor) -> ProcessOutcome {
        let job_id = descriptor.job_id;
        if let Err(outcome) = self.claim(&descriptor).await {
            return outcome;
        }
        tracing::info!(
            job_id,
            players = descriptor.inputs.len(),
            executor = self.executor.name(),
            "job running"
        );

        let (status, result_ref) = self.execute(&descriptor).await;
        self.finish(job_id, status, result_ref).await
    }

    async fn claim(&self, descriptor: &QueueDescriptor) -> Result<Job, ProcessOutcome> {
        let job_id = descriptor.job_id;
        let mut delay = self.settings.retry_backoff;
        let mut attempt = 0;
        loop {
            let err = match self.try_claim(job_id).await {
                Ok(job) => return Ok(job),
                Err(ClaimError::NotQueued(status)) => {
                    tracing::info!(job_id, %status, "skipping descriptor for a job that is not queued");
                    return Err(ProcessOutcome::Skipped { job_id, status });
                }
                Err(ClaimError::Store(err)) => err,
            };

            if err.is_transient() && attempt < self.settings.claim_retries {
                attempt += 1;
                tracing::warn!(job_id, attempt, error = %err, "failed to claim job, retrying");
                tokio::time::sleep(delay).await;
                delay = next_backoff(delay);
                continue;
            }

            let reason = err.to_string();
            tracing::error!(job_id, error = %reason, "dropping descriptor to dead letters");
            if let Err(e) = self.queue.dead_letter(descriptor, &reason).await {
                tracing::error!(job_id, error = %e, "failed to dead-letter descriptor");
            }
            return Err(ProcessOutcome::DeadLettered { job_id, reason });
        }
    }

    async fn try_claim(&self, job_id: JobId) -> Result<Job, ClaimError> {
        let job = self
            .store
            .get(job_id)
            .await
            .map_err(ClaimError::Store)?
            .ok_or(ClaimError::Store(JobQueueError::NotFound(job_id)))?;
        if job.status != JobStatus::Queued {
            return Err(ClaimError::NotQueued(job.status));
        }

        match self.store.update_status(job_id, JobUpdate::running()).await {
            Ok(job) => Ok(job),
            Err(JobQueueError::InvalidTransition { from, .. }) => Err(ClaimError::NotQueued(from)),
            Err(e) => Err(ClaimError::Store(e)),
        }
    }

    async fn execute(&self, descriptor: &QueueDescriptor) -> (JobStatus, String) {
        let output_dir = job_output_dir(&self.settings.output_root, descriptor.job_id);
        if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
            return (
                JobStatus::Error,
                format!(
                    "failed to create output directory {}: {e}",
                    output_dir.display()
                ),
            );
        }

        let run = self.executor.run(&descriptor.inputs, &output_dir);
        let result = match tokio::time::timeout(self.settings.job_timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(ExecutorError::TimedOut(self.settings.job_timeout)),
        };
        self.interpret(descriptor.job_id, result)
    }

    fn interpret(
        &self,
        job_id: JobId,
        result: Result<ExecutionOutcome, ExecutorError>,
    ) -> (JobStatus, String) {
        let root = &self.settings.output_root;
        match result {
            Ok(ExecutionOutcome::Success { artifact_path }) => {
                (JobStatus::Done, relativize(&artifact_path, root))
            }
            Ok(ExecutionOutcome::Blocked {
                message,
                artifact_path: Some(path),
            }) => {
                tracing::warn!(job_id, %message, "executor blocked");
                (JobStatus::Blocked, relativize(&path, root))
            }
            Ok(ExecutionOutcome::Blocked {
                message,
                artifact_path: None,
            }) => {
                tracing::warn!(job_id, %message, "executor blocked");
                (JobStatus::Blocked, message)
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "executor failed");
                (JobStatus::Error, e.to_string())
            }
        }
    }

    async fn finish(&self, job_id: JobId, status: JobStatus, result_ref: String) -> ProcessOutcome {
        // Built once so every retry carries the same finished_at.
        let update = JobUpdate::finished(status, result_ref);
        let mut delay = self.settings.retry_backoff;
        let mut attempt = 0;
        loop {
            match self.store.update_status(job_id, update.clone()).await {
                Ok(job) => {
                    tracing::info!(
                        job_id,
                        status = %job.status,
                        result_ref = job.result_ref.as_deref().unwrap_or_default(),
                        "job finished"
                    );
                    return ProcessOutcome::Completed(job);
                }
                Err(e) if e.is_transient() && attempt < self.settings.claim_retries => {
                    attempt += 1;
                    tracing::warn!(job_id, attempt, error = %e, "failed to record job outcome, retrying");
                    tokio::time::sleep(delay).await;
                    delay = next_backoff(delay);
                }
                Err(e) => {
                    tracing::error!(job_id, %status, error = %e, "failed to record job outcome");
                    return ProcessOutcome::Unrecorded {
                        job_id,
                        status,
                        error: e.to_string(),
                    };
                }
            }
        }
    }
}

/// Handle to a running worker task.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    #[inline]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Asks the loop to stop and waits for it, including any job in progress.
    pub async fn stop(self) -> Result<(), JoinError> {
        let _ = self.shutdown.send(true);
        self.task.await
    }
}

/// Sleeps for `delay`; returns true if a stop was requested meanwhile.
async fn pause(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.wait_for(|stop| *stop) => true,
    }
}

#[inline]
fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2).min(MAX_BACKOFF)
}
