use sqlx::Executor;
use wosrewards_job_queue::{parse_timestamp, Job, JobStatus};

use crate::DbBackend;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct JobsRow {
    pub id: i64,
    /// JSON array of player ids.
    pub player_ids: String,
    pub status: String,
    pub created_at: String,
    pub finished_at: Option<String>,
    pub result_ref: Option<String>,
}

impl JobsRow {
    /// Decodes the stored columns; the error names the offending column.
    pub fn into_job(self) -> Result<Job, String> {
        let inputs: Vec<String> = serde_json::from_str(&self.player_ids)
            .map_err(|e| format!("job {}: bad player_ids: {e}", self.id))?;
        let status: JobStatus = self
            .status
            .parse()
            .map_err(|e| format!("job {}: {e}", self.id))?;
        let created_at = parse_timestamp(&self.created_at)
            .map_err(|e| format!("job {}: bad created_at: {e}", self.id))?;
        let finished_at = self
            .finished_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| format!("job {}: bad finished_at: {e}", self.id))?;

        Ok(Job {
            id: self.id,
            inputs,
            status,
            created_at,
            finished_at,
            result_ref: self.result_ref,
        })
    }
}

pub async fn insert<'e, E>(
    executor: E,
    player_ids: &str,
    created_at: &str,
) -> Result<JobsRow, sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query_as::<_, JobsRow>(
        r#"
        INSERT INTO jobs (player_ids, status, created_at)
        VALUES (?, 'queued', ?)
        RETURNING id, player_ids, status, created_at, finished_at, result_ref
        "#,
    )
    .bind(player_ids)
    .bind(created_at)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<JobsRow>, sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query_as::<_, JobsRow>(
        "SELECT id, player_ids, status, created_at, finished_at, result_ref FROM jobs WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Most recently created first. A negative `limit` means no limit.
pub async fn list_recent<'e, E>(
    executor: E,
    limit: i64,
    offset: i64,
) -> Result<Vec<JobsRow>, sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query_as::<_, JobsRow>(
        r#"
        SELECT id, player_ids, status, created_at, finished_at, result_ref
        FROM jobs
        ORDER BY id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

pub async fn count<'e, E>(executor: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
        .fetch_one(executor)
        .await
}

/// Single-statement status update guarded by the allowed current statuses.
///
/// `finished_at` is only written while still unset; `result_ref` only when
/// supplied. Returns `None` when no row matched (unknown id or disallowed move).
pub async fn update_status<'e, E>(
    executor: E,
    id: i64,
    status: JobStatus,
    finished_at: Option<&str>,
    result_ref: Option<&str>,
) -> Result<Option<JobsRow>, sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    let [from_a, from_b] = JobStatus::allowed_predecessors(status);
    sqlx::query_as::<_, JobsRow>(
        r#"
        UPDATE jobs
        SET status = ?,
            finished_at = COALESCE(finished_at, ?),
            result_ref = COALESCE(?, result_ref)
        WHERE id = ? AND status IN (?, ?)
        RETURNING id, player_ids, status, created_at, finished_at, result_ref
        "#,
    )
    .bind(status.as_str())
    .bind(finished_at)
    .bind(result_ref)
    .bind(id)
    .bind(from_a.as_str())
    .bind(from_b.as_str())
    .fetch_optional(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::migrated_pool;

    #[tokio::test]
    async fn insert_returns_queued_row() {
        let pool = migrated_pool().await;
        let row = insert(&pool, r#"["111"]"#, "2024-05-01T10:00:00Z")
            .await
            .unwrap();
        assert_eq!(row.id, 1);
        assert_eq!(row.status, "queued");
        assert_eq!(row.finished_at, None);
        assert_eq!(find_by_id(&pool, 1).await.unwrap(), Some(row));
    }

    #[tokio::test]
    async fn guarded_update_skips_disallowed_moves() {
        let pool = migrated_pool().await;
        let row = insert(&pool, r#"["111"]"#, "2024-05-01T10:00:00Z")
            .await
            .unwrap();

        let skipped = update_status(&pool, row.id, JobStatus::Done, Some("2024-05-01T10:05:00Z"), None)
            .await
            .unwrap();
        assert_eq!(skipped, None);
        assert_eq!(
            find_by_id(&pool, row.id).await.unwrap().map(|r| r.status),
            Some("queued".to_string())
        );
    }

    #[test]
    fn corrupt_rows_report_the_column() {
        let row = JobsRow {
            id: 9,
            player_ids: "not json".into(),
            status: "queued".into(),
            created_at: "2024-05-01T10:00:00Z".into(),
            finished_at: None,
            result_ref: None,
        };
        let err = row.into_job().unwrap_err();
        assert!(err.contains("player_ids"), "{err}");
    }
}
