use serde::Serialize;
use sqlx::Executor;
use thiserror::Error;
use wosrewards_db_connection::DbPool;

use crate::DbBackend;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlayersRow {
    pub id: i64,
    pub player_id: String,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("player id cannot be empty")]
    EmptyPlayerId,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Inserts unless the id is already registered; returns whether a row was added.
pub async fn insert_ignore<'e, E>(executor: E, player_id: &str) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    let result = sqlx::query("INSERT OR IGNORE INTO players (player_id) VALUES (?)")
        .bind(player_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn list_all<'e, E>(executor: E) -> Result<Vec<PlayersRow>, sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query_as::<_, PlayersRow>("SELECT id, player_id FROM players ORDER BY id")
        .fetch_all(executor)
        .await
}

/// Known player ids, kept so they can be picked for a new batch.
#[derive(Debug, Clone)]
pub struct PlayerRegistry {
    pool: DbPool,
}

impl PlayerRegistry {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Registers a player id. Re-adding a known id is not an error.
    pub async fn add_player(&self, player_id: &str) -> Result<bool, RegistryError> {
        let player_id = player_id.trim();
        if player_id.is_empty() {
            return Err(RegistryError::EmptyPlayerId);
        }
        let added = insert_ignore(&self.pool, player_id).await?;
        if added {
            tracing::info!(player_id, "player registered");
        }
        Ok(added)
    }

    /// All registered players in insertion order.
    pub async fn list_players(&self) -> Result<Vec<PlayersRow>, RegistryError> {
        Ok(list_all(&self.pool).await?)
    }
}
