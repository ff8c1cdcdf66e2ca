//! Queue backends carrying pending-job descriptors from the dispatcher to the worker.
//!
//! The queue is only a wake-up channel; the job store stays the source of
//! truth, which is why a replayed descriptor is harmless to the worker.

mod memory;
mod redis;
mod spool;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use wosrewards_config::{QueueBackendKind, QueueConfig};

use crate::error::JobQueueError;
use crate::types::QueueDescriptor;

pub use memory::MemoryQueue;
pub use redis::RedisQueue;
pub use spool::SpoolQueue;

/// Transport for queue descriptors, delivered in enqueue order.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    async fn enqueue(&self, descriptor: &QueueDescriptor) -> Result<(), JobQueueError>;

    /// Returns at most one descriptor, waiting no longer than `timeout`.
    ///
    /// Backends that cannot block return `None` immediately when empty.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<QueueDescriptor>, JobQueueError>;

    /// Parks a descriptor the worker gave up on, with the reason.
    async fn dead_letter(
        &self,
        descriptor: &QueueDescriptor,
        reason: &str,
    ) -> Result<(), JobQueueError>;
}

/// Everything needed to build a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub backend: QueueBackendKind,
    pub name: String,
    pub redis_url: Option<String>,
    pub spool_dir: PathBuf,
}

impl QueueSettings {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            backend: config.resolved_backend(),
            name: config.name.clone(),
            redis_url: config.redis_url.clone(),
            spool_dir: PathBuf::from(&config.spool_dir),
        }
    }
}

/// Builds the configured backend.
///
/// The redis backend connects lazily, so this only fails on a malformed URL;
/// the spool backend creates its directories up front.
pub async fn connect_queue(
    settings: &QueueSettings,
) -> Result<Arc<dyn QueueBackend>, JobQueueError> {
    let queue: Arc<dyn QueueBackend> = match settings.backend {
        QueueBackendKind::Local => Arc::new(SpoolQueue::open(&settings.spool_dir).await?),
        QueueBackendKind::Redis => {
            let url = settings
                .redis_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| {
                    JobQueueError::QueueUnavailable(
                        "redis backend selected but no redis url configured".into(),
                    )
                })?;
            Arc::new(RedisQueue::new(url, &settings.name)?)
        }
        QueueBackendKind::Memory => Arc::new(MemoryQueue::new()),
    };
    tracing::info!(queue = queue.name(), "queue backend ready");
    Ok(queue)
}
