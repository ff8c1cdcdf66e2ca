//! Job store contract and the in-memory implementation.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::JobQueueError;
use crate::types::{now_timestamp, Job, JobId, JobUpdate};

/// Durable record of every job and its lifecycle state.
///
/// Implementations must make each operation atomic with respect to readers:
/// a `get` or `list` never observes a half-written record.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Allocates a new `queued` job stamped with the current time.
    async fn create(&self, inputs: Vec<String>) -> Result<Job, JobQueueError>;

    async fn get(&self, id: JobId) -> Result<Option<Job>, JobQueueError>;

    /// Jobs ordered most recently created first.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Job>, JobQueueError>;

    async fn count(&self) -> Result<usize, JobQueueError>;

    /// Writes the supplied fields and returns the updated record.
    ///
    /// Fails with [`JobQueueError::NotFound`] for unknown ids and
    /// [`JobQueueError::InvalidTransition`] when the status move is not allowed.
    async fn update_status(&self, id: JobId, update: JobUpdate) -> Result<Job, JobQueueError>;
}

/// Internal storage optimized for both iteration and lookup by ID.
#[derive(Debug)]
struct JobTable {
    /// Job ids, oldest first.
    order: VecDeque<JobId>,
    jobs: HashMap<JobId, Job>,
    next_id: JobId,
}

impl Default for JobTable {
    fn default() -> Self {
        Self {
            order: VecDeque::new(),
            jobs: HashMap::new(),
            next_id: 1,
        }
    }
}

impl JobTable {
    fn insert(&mut self, inputs: Vec<String>) -> Job {
        let id = self.next_id;
        self.next_id += 1;
        let job = Job::new(id, inputs, now_timestamp());
        self.jobs.insert(id, job.clone());
        self.order.push_back(id);
        job
    }

    /// Iterate over all jobs, most recent first.
    fn iter_recent(&self) -> impl Iterator<Item = &Job> {
        self.order.iter().rev().filter_map(|id| self.jobs.get(id))
    }
}

/// Job store kept entirely in process memory.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    table: Arc<RwLock<JobTable>>,
}

impl fmt::Debug for MemoryJobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryJobStore")
            .field("table", &"<RwLock<JobTable>>")
            .finish()
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, inputs: Vec<String>) -> Result<Job, JobQueueError> {
        let mut table = self.table.write().await;
        Ok(table.insert(inputs))
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, JobQueueError> {
        let table = self.table.read().await;
        Ok(table.jobs.get(&id).cloned())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Job>, JobQueueError> {
        let table = self.table.read().await;
        Ok(table.iter_recent().skip(offset).take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<usize, JobQueueError> {
        let table = self.table.read().await;
        Ok(table.jobs.len())
    }

    async fn update_status(&self, id: JobId, update: JobUpdate) -> Result<Job, JobQueueError> {
        let mut table = self.table.write().await;
        let job = table.jobs.get_mut(&id).ok_or(JobQueueError::NotFound(id))?;
        // Apply to a copy so a rejected move leaves the record untouched.
        let mut next = job.clone();
        next.apply(&update)
            .map_err(|(from, to)| JobQueueError::InvalidTransition { id, from, to })?;
        *job = next.clone();
        Ok(next)
    }
}
