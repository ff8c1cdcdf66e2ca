//! Job queue and worker lifecycle for wosrewards.
//!
//! Jobs are recorded in a [`JobStore`], announced through a [`QueueBackend`]
//! and processed one at a time by a single [`Worker`] that hands each batch
//! of player ids to a [`JobExecutor`].
//!
//! # Architecture
//!
//! - [`Dispatcher`] - Creates job records and enqueues their descriptors
//! - [`JobStore`] - Source of truth for job state ([`MemoryJobStore`] here,
//!   the SQL store lives in `wosrewards-db`)
//! - [`QueueBackend`] - Transport for descriptors: [`RedisQueue`],
//!   [`SpoolQueue`] or [`MemoryQueue`], built by [`connect_queue`]
//! - [`Worker`] - Claims, executes and records jobs; [`WorkerHandle`] stops it
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use wosrewards_job_queue::{
//!     async_trait, Dispatcher, ExecutionOutcome, ExecutorError, JobExecutor, MemoryJobStore,
//!     MemoryQueue, Worker, WorkerSettings,
//! };
//!
//! struct StatusSheet;
//!
//! #[async_trait]
//! impl JobExecutor for StatusSheet {
//!     fn name(&self) -> &str {
//!         "status-sheet"
//!     }
//!
//!     async fn run(
//!         &self,
//!         inputs: &[String],
//!         output_dir: &Path,
//!     ) -> Result<ExecutionOutcome, ExecutorError> {
//!         let artifact_path = output_dir.join("status.csv");
//!         let rows: String = inputs.iter().map(|id| format!("{id},applied\n")).collect();
//!         std::fs::write(&artifact_path, rows).map_err(|e| ExecutorError::io("write", e))?;
//!         Ok(ExecutionOutcome::Success { artifact_path })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryJobStore::new());
//!     let queue = Arc::new(MemoryQueue::new());
//!
//!     let worker = Worker::new(
//!         store.clone(),
//!         queue.clone(),
//!         Arc::new(StatusSheet),
//!         WorkerSettings::new("jobs_data"),
//!     )
//!     .start();
//!
//!     let dispatcher = Dispatcher::new(store, queue);
//!     let job = dispatcher.submit(vec!["111".into(), "222".into()]).await.unwrap();
//!     println!("submitted job {}", job.id);
//!
//!     worker.stop().await.unwrap();
//! }
//! ```

mod dispatcher;
mod error;
mod executor;
mod paths;
pub mod queue;
mod store;
mod types;
mod worker;

pub use dispatcher::{normalize_inputs, Dispatcher};
pub use error::{ExecutorError, JobQueueError};
pub use executor::{ExecutionOutcome, JobExecutor, NoOpExecutor, STATUS_FILE_NAME};
pub use paths::{job_output_dir, relativize};
pub use queue::{connect_queue, MemoryQueue, QueueBackend, QueueSettings, RedisQueue, SpoolQueue};
pub use store::{JobStore, MemoryJobStore};
pub use types::{
    format_timestamp, now_timestamp, parse_timestamp, Job, JobId, JobStatus, JobUpdate,
    QueueDescriptor, UnknownStatus, TIMESTAMP_FORMAT,
};
pub use worker::{ProcessOutcome, Worker, WorkerHandle, WorkerSettings, MAX_BACKOFF};

// Re-export async_trait for convenience when implementing the traits above
pub use async_trait::async_trait;
