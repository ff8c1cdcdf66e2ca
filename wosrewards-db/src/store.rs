use async_trait::async_trait;
use wosrewards_db_connection::DbPool;
use wosrewards_job_queue::{
    format_timestamp, now_timestamp, Job, JobId, JobQueueError, JobStatus, JobStore, JobUpdate,
};

use crate::jobs::{self as db_jobs, JobsRow};

/// [`JobStore`] over the `jobs` table. Every operation is one statement.
#[derive(Debug, Clone)]
pub struct SqlJobStore {
    pool: DbPool,
}

impl SqlJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn unavailable(err: sqlx::Error) -> JobQueueError {
    JobQueueError::StoreUnavailable(err.to_string())
}

fn decode(row: JobsRow) -> Result<Job, JobQueueError> {
    row.into_job().map_err(|reason| {
        tracing::error!(%reason, "unreadable job row");
        JobQueueError::StoreUnavailable(format!("corrupt job record: {reason}"))
    })
}

#[async_trait]
impl JobStore for SqlJobStore {
    async fn create(&self, inputs: Vec<String>) -> Result<Job, JobQueueError> {
        let player_ids = serde_json::to_string(&inputs)
            .map_err(|e| JobQueueError::InvalidInput(e.to_string()))?;
        let created_at = format_timestamp(&now_timestamp());
        let row = db_jobs::insert(&self.pool, &player_ids, &created_at)
            .await
            .map_err(unavailable)?;
        decode(row)
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, JobQueueError> {
        db_jobs::find_by_id(&self.pool, id)
            .await
            .map_err(unavailable)?
            .map(decode)
            .transpose()
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Job>, JobQueueError> {
        // SQLite reads a negative LIMIT as "no limit".
        let limit = i64::try_from(limit).unwrap_or(-1);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        db_jobs::list_recent(&self.pool, limit, offset)
            .await
            .map_err(unavailable)?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn count(&self) -> Result<usize, JobQueueError> {
        let total = db_jobs::count(&self.pool).await.map_err(unavailable)?;
        Ok(usize::try_from(total).unwrap_or_default())
    }

    async fn update_status(&self, id: JobId, update: JobUpdate) -> Result<Job, JobQueueError> {
        let finished_at = update.effective_finished_at().map(|at| format_timestamp(&at));
        let updated = db_jobs::update_status(
            &self.pool,
            id,
            update.status,
            finished_at.as_deref(),
            update.result_ref.as_deref(),
        )
        .await
        .map_err(unavailable)?;

        if let Some(row) = updated {
            return decode(row);
        }

        // Nothing matched: tell an unknown id apart from a refused move.
        let current = db_jobs::find_by_id(&self.pool, id)
            .await
            .map_err(unavailable)?
            .ok_or(JobQueueError::NotFound(id))?;
        let from = current
            .status
            .parse::<JobStatus>()
            .map_err(|e| JobQueueError::StoreUnavailable(format!("corrupt job record: {e}")))?;
        Err(JobQueueError::InvalidTransition {
            id,
            from,
            to: update.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::migrated_pool;

    async fn store() -> SqlJobStore {
        SqlJobStore::new(migrated_pool().await)
    }

    #[tokio::test]
    async fn create_and_read_back() {
        let store = store().await;
        let job = store
            .create(vec!["111".into(), "222".into()])
            .await
            .unwrap();

        assert_eq!(job.id, 1);
        assert_eq!(job.inputs, vec!["111", "222"]);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(store.get(1).await.unwrap(), Some(job));
        assert_eq!(store.get(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_is_most_recent_first() {
        let store = store().await;
        for n in 1..=4 {
            store.create(vec![n.to_string()]).await.unwrap();
        }

        let all: Vec<_> = store
            .list(usize::MAX, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(all, vec![4, 3, 2, 1]);

        let page: Vec<_> = store
            .list(2, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(page, vec![3, 2]);
        assert_eq!(store.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn full_lifecycle_and_idempotent_finish() {
        let store = store().await;
        let job = store.create(vec!["111".into()]).await.unwrap();

        let running = store.update_status(job.id, JobUpdate::running()).await.unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert_eq!(running.finished_at, None);

        let done = JobUpdate::finished(JobStatus::Done, "job_1/status.csv");
        let first = store.update_status(job.id, done.clone()).await.unwrap();
        assert_eq!(first.result_ref.as_deref(), Some("job_1/status.csv"));
        assert!(first.finished_at.is_some());

        let second = store.update_status(job.id, done).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn refused_moves_and_unknown_ids() {
        let store = store().await;
        let job = store.create(vec!["111".into()]).await.unwrap();

        let err = store
            .update_status(job.id, JobUpdate::finished(JobStatus::Error, "boom"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            JobQueueError::InvalidTransition {
                from: JobStatus::Queued,
                to: JobStatus::Error,
                ..
            }
        ));

        let err = store
            .update_status(404, JobUpdate::running())
            .await
            .unwrap_err();
        assert!(matches!(err, JobQueueError::NotFound(404)));
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = store().await;
        let first = store.create(vec!["111".into()]).await.unwrap();
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(first.id)
            .execute(store.pool())
            .await
            .unwrap();
        let second = store.create(vec!["222".into()]).await.unwrap();
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn closed_pool_is_store_unavailable() {
        let store = store().await;
        store.pool().close().await;
        let err = store.create(vec!["111".into()]).await.unwrap_err();
        assert!(matches!(err, JobQueueError::StoreUnavailable(_)));
    }
}
