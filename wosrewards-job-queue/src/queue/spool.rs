use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::json;
use tokio::io::AsyncWriteExt;

use super::QueueBackend;
use crate::error::JobQueueError;
use crate::types::{format_timestamp, now_timestamp, QueueDescriptor};

const ENTRY_EXTENSION: &str = ".json";
const DEAD_DIR: &str = "dead";

/// Last stamp handed out by this process; stamps are strictly increasing.
static LAST_STAMP: AtomicU64 = AtomicU64::new(0);
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Filesystem spool: one descriptor per file, consumed oldest name first.
///
/// Entries are written to a hidden temporary file and renamed into place, so
/// a reader never sees a partial descriptor. Dequeue never blocks.
#[derive(Debug, Clone)]
pub struct SpoolQueue {
    dir: PathBuf,
    dead_dir: PathBuf,
}

impl SpoolQueue {
    /// Opens the spool, creating the directory and its `dead/` area.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, JobQueueError> {
        let dir = dir.into();
        let dead_dir = dir.join(DEAD_DIR);
        tokio::fs::create_dir_all(&dead_dir)
            .await
            .map_err(|e| spool_error(&dead_dir, "create", e))?;
        Ok(Self { dir, dead_dir })
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[inline]
    pub fn dead_dir(&self) -> &Path {
        &self.dead_dir
    }

    /// Names of the pending entries in delivery order.
    pub async fn pending(&self) -> Result<Vec<String>, JobQueueError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| spool_error(&self.dir, "list", e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| spool_error(&self.dir, "list", e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') || !name.ends_with(ENTRY_EXTENSION) {
                continue;
            }
            names.push(name);
        }
        names.sort_unstable();
        Ok(names)
    }

    async fn write_atomically(&self, dir: &Path, name: &str, body: &[u8]) -> Result<(), JobQueueError> {
        let tmp = dir.join(format!(".{name}.tmp"));
        let target = dir.join(name);

        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| spool_error(&tmp, "create", e))?;
        file.write_all(body)
            .await
            .map_err(|e| spool_error(&tmp, "write", e))?;
        file.sync_all()
            .await
            .map_err(|e| spool_error(&tmp, "sync", e))?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(spool_error(&target, "publish", e));
        }
        Ok(())
    }

    /// Moves an unreadable entry out of the way so it is not retried forever.
    async fn quarantine(&self, name: &str, reason: &str) {
        let from = self.dir.join(name);
        let to = self.dead_dir.join(name);
        match tokio::fs::rename(&from, &to).await {
            Ok(()) => tracing::warn!(entry = name, reason, "moved unreadable spool entry to dead letters"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::error!(entry = name, error = %e, "failed to quarantine spool entry"),
        }
    }
}

#[async_trait]
impl QueueBackend for SpoolQueue {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn enqueue(&self, descriptor: &QueueDescriptor) -> Result<(), JobQueueError> {
        let body = descriptor
            .to_json()
            .map_err(|e| JobQueueError::QueueUnavailable(format!("failed to encode descriptor: {e}")))?;
        let name = entry_name(descriptor.job_id);
        self.write_atomically(&self.dir, &name, body.as_bytes()).await?;
        tracing::debug!(job_id = descriptor.job_id, entry = %name, "spooled descriptor");
        Ok(())
    }

    async fn dequeue(&self, _timeout: Duration) -> Result<Option<QueueDescriptor>, JobQueueError> {
        for name in self.pending().await? {
            let path = self.dir.join(&name);
            let raw = match tokio::fs::read_to_string(&path).await {
                Ok(raw) => raw,
                // Another consumer took it between listing and reading.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                // Unreadable entry: quarantine it and keep scanning.
                Err(e) => {
                    self.quarantine(&name, &e.to_string()).await;
                    continue;
                }
            };

            let descriptor = match QueueDescriptor::from_json(&raw) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    self.quarantine(&name, &e.to_string()).await;
                    continue;
                }
            };

            match tokio::fs::remove_file(&path).await {
                Ok(()) => return Ok(Some(descriptor)),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(spool_error(&path, "remove", e)),
            }
        }
        Ok(None)
    }

    async fn dead_letter(
        &self,
        descriptor: &QueueDescriptor,
        reason: &str,
    ) -> Result<(), JobQueueError> {
        let body = json!({
            "job_id": descriptor.job_id,
            "inputs": descriptor.inputs,
            "reason": reason,
            "dead_lettered_at": format_timestamp(&now_timestamp()),
        })
        .to_string();
        let name = entry_name(descriptor.job_id);
        self.write_atomically(&self.dead_dir, &name, body.as_bytes())
            .await
    }
}

/// `<unix micros>-<sequence>-<job id>.json`, zero padded so names sort by creation.
fn entry_name(job_id: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0);
    // Never hand out a stamp at or below the previous one, even if the clock steps back.
    let previous = LAST_STAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last.saturating_add(1)))
        })
        .unwrap_or(now);
    let stamp = now.max(previous.saturating_add(1));
    let seq = SEQUENCE.fetch_add(1, Ordering::SeqCst);
    format!("{stamp:020}-{seq:010}-{job_id}{ENTRY_EXTENSION}")
}

fn spool_error(path: &Path, action: &str, err: std::io::Error) -> JobQueueError {
    JobQueueError::QueueUnavailable(format!(
        "failed to {action} spool entry {}: {err}",
        path.display()
    ))
}
