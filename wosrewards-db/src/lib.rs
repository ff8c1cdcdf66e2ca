//! Durable storage for wosrewards: the SQL [`JobStore`] and the player registry.
//!
//! Row types and queries live in one module per table, mirroring the schema
//! in `wosrewards-migrations`.
//!
//! [`JobStore`]: wosrewards_job_queue::JobStore

pub type DbBackend = sqlx::Sqlite;

pub mod jobs;
pub mod players;
mod store;

pub use players::{PlayerRegistry, PlayersRow, RegistryError};
pub use store::SqlJobStore;
pub use wosrewards_db_connection::{create_pool, DbConnectionConfig, DbConnectionError, DbPool};
