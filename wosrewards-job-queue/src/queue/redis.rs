use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;

use super::QueueBackend;
use crate::error::JobQueueError;
use crate::types::QueueDescriptor;

const DEAD_SUFFIX: &str = ":dead";

/// Shared redis list: producers `LPUSH`, the worker `BRPOP`s from the other end.
///
/// Producer and consumer keep separate connections so a blocking pop never
/// delays an enqueue. Connections are opened on first use and dropped after
/// any error so the next call reconnects.
pub struct RedisQueue {
    client: redis::Client,
    key: String,
    dead_key: String,
    producer: Mutex<Option<MultiplexedConnection>>,
    consumer: Mutex<Option<MultiplexedConnection>>,
}

impl std::fmt::Debug for RedisQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisQueue")
            .field("key", &self.key)
            .field("dead_key", &self.dead_key)
            .finish_non_exhaustive()
    }
}

impl RedisQueue {
    /// Validates the URL; no connection is made until the first call.
    pub fn new(url: &str, name: &str) -> Result<Self, JobQueueError> {
        let client = redis::Client::open(url).map_err(|e| {
            JobQueueError::QueueUnavailable(format!("invalid redis url: {e}"))
        })?;
        Ok(Self {
            client,
            key: name.to_owned(),
            dead_key: dead_key(name),
            producer: Mutex::new(None),
            consumer: Mutex::new(None),
        })
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn dead_key(&self) -> &str {
        &self.dead_key
    }

    async fn connection(
        &self,
        slot: &Mutex<Option<MultiplexedConnection>>,
    ) -> Result<MultiplexedConnection, JobQueueError> {
        let mut guard = slot.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(slot: &Mutex<Option<MultiplexedConnection>>) {
        slot.lock().await.take();
    }

    async fn push(&self, key: &str, payload: String) -> Result<(), JobQueueError> {
        let mut conn = self.connection(&self.producer).await?;
        let pushed = redis::cmd("LPUSH")
            .arg(key)
            .arg(payload)
            .query_async::<i64>(&mut conn)
            .await;
        if let Err(e) = pushed {
            Self::reset(&self.producer).await;
            return Err(unavailable(e));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueBackend for RedisQueue {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn enqueue(&self, descriptor: &QueueDescriptor) -> Result<(), JobQueueError> {
        let payload = descriptor
            .to_json()
            .map_err(|e| JobQueueError::QueueUnavailable(format!("failed to encode descriptor: {e}")))?;
        self.push(&self.key, payload).await?;
        tracing::debug!(job_id = descriptor.job_id, key = %self.key, "pushed descriptor");
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<QueueDescriptor>, JobQueueError> {
        let mut conn = self.connection(&self.consumer).await?;
        let secs = timeout.as_secs_f64();
        // BRPOP treats 0 as "block forever", so a zero timeout polls instead.
        let popped = if secs < 0.001 {
            redis::cmd("RPOP")
                .arg(&self.key)
                .query_async::<Option<String>>(&mut conn)
                .await
        } else {
            redis::cmd("BRPOP")
                .arg(&self.key)
                .arg(secs)
                .query_async::<Option<(String, String)>>(&mut conn)
                .await
                .map(|reply| reply.map(|(_, payload)| payload))
        };

        let payload = match popped {
            Ok(Some(payload)) => payload,
            Ok(None) => return Ok(None),
            Err(e) => {
                Self::reset(&self.consumer).await;
                return Err(unavailable(e));
            }
        };

        match QueueDescriptor::from_json(&payload) {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "discarding malformed descriptor to dead letters");
                self.push(&self.dead_key, payload).await?;
                Ok(None)
            }
        }
    }

    async fn dead_letter(
        &self,
        descriptor: &QueueDescriptor,
        reason: &str,
    ) -> Result<(), JobQueueError> {
        let payload = serde_json::json!({
            "job_id": descriptor.job_id,
            "inputs": descriptor.inputs,
            "reason": reason,
        })
        .to_string();
        self.push(&self.dead_key, payload).await
    }
}

#[inline]
fn dead_key(name: &str) -> String {
    format!("{name}{DEAD_SUFFIX}")
}

fn unavailable(err: redis::RedisError) -> JobQueueError {
    JobQueueError::QueueUnavailable(format!("redis: {err}"))
}
