use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::QueueBackend;
use crate::error::JobQueueError;
use crate::types::QueueDescriptor;

/// Process-local FIFO queue with a blocking, timeout-bounded dequeue.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<QueueDescriptor>>,
    notify: Notify,
    dead: Mutex<Vec<(QueueDescriptor, String)>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Descriptors parked by [`QueueBackend::dead_letter`], oldest first.
    pub async fn dead_letters(&self) -> Vec<(QueueDescriptor, String)> {
        self.dead.lock().await.clone()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn enqueue(&self, descriptor: &QueueDescriptor) -> Result<(), JobQueueError> {
        self.items.lock().await.push_back(descriptor.clone());
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<QueueDescriptor>, JobQueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so an enqueue in between is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(descriptor) = self.items.lock().await.pop_front() {
                return Ok(Some(descriptor));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(self.items.lock().await.pop_front());
            }
        }
    }

    async fn dead_letter(
        &self,
        descriptor: &QueueDescriptor,
        reason: &str,
    ) -> Result<(), JobQueueError> {
        self.dead
            .lock()
            .await
            .push((descriptor.clone(), reason.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn descriptor(id: i64) -> QueueDescriptor {
        QueueDescriptor::new(id, vec![format!("player-{id}")])
    }

    #[tokio::test]
    async fn delivers_in_enqueue_order() {
        let queue = MemoryQueue::new();
        queue.enqueue(&descriptor(1)).await.unwrap();
        queue.enqueue(&descriptor(2)).await.unwrap();

        let short = Duration::from_millis(10);
        assert_eq!(queue.dequeue(short).await.unwrap(), Some(descriptor(1)));
        assert_eq!(queue.dequeue(short).await.unwrap(), Some(descriptor(2)));
        assert_eq!(queue.dequeue(short).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_dequeue_waits_for_the_timeout() {
        let queue = MemoryQueue::new();
        let started = Instant::now();
        assert_eq!(queue.dequeue(Duration::from_secs(5)).await.unwrap(), None);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn blocked_dequeue_wakes_on_enqueue() {
        let queue = Arc::new(MemoryQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue(Duration::from_secs(30)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(&descriptor(9)).await.unwrap();

        let got = tokio::time::timeout(Duration::from_secs(5), consumer)
            .await
            .expect("consumer woke")
            .unwrap()
            .unwrap();
        assert_eq!(got, Some(descriptor(9)));
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn dead_letters_are_kept_with_reason() {
        let queue = MemoryQueue::new();
        queue.dead_letter(&descriptor(3), "job not found: 3").await.unwrap();
        assert_eq!(
            queue.dead_letters().await,
            vec![(descriptor(3), "job not found: 3".to_string())]
        );
        assert_eq!(queue.len().await, 0);
    }
}
