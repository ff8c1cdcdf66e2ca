use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::DbConnectionConfig;
use crate::error::DbConnectionError;
use crate::utils::sanitize_database_url;

pub type DbPool = SqlitePool;

// SQLite memory database patterns for efficient checking
pub const SQLITE_MEMORY_PATTERNS: &[&[u8]] = &[b":memory:", b"mode=memory"];

/// Returns true when the DSN names an in-memory database.
pub fn is_memory_url(url: &str) -> bool {
    let url_bytes = url.as_bytes();
    SQLITE_MEMORY_PATTERNS.iter().any(|&pattern| {
        url_bytes
            .windows(pattern.len())
            .any(|w| w.eq_ignore_ascii_case(pattern))
    })
}

/// Creates a new SQLite connection pool using the provided configuration.
///
/// File-backed databases get their parent directory created and run in WAL
/// mode so status readers never block the worker's writes. An in-memory
/// database only exists inside a single connection, so its pool is pinned to
/// one long-lived connection.
pub async fn create_pool(config: &DbConnectionConfig) -> Result<DbPool, DbConnectionError> {
    config.validate()?;
    let url = config.url.trim();

    let memory = is_memory_url(url);
    if !memory {
        ensure_sqlite_parent_dir(url)?;
    }

    let mut connect = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .busy_timeout(config.busy_timeout());
    if !memory {
        connect = connect.journal_mode(SqliteJournalMode::Wal);
    }

    let opts = if memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        let mut opts = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections);
        if let Some(idle) = config.idle_timeout() {
            opts = opts.idle_timeout(idle);
        }
        opts
    };

    let pool = opts
        .acquire_timeout(config.connect_timeout())
        .connect_with(connect)
        .await?;

    tracing::debug!(
        database_url = %sanitize_database_url(url),
        in_memory = memory,
        "database pool created"
    );
    Ok(pool)
}

/// Extract the file path from a SQLite connection URL.
/// Returns None for in-memory databases or empty paths.
pub(crate) fn extract_path(url: &str) -> Option<&str> {
    if is_memory_url(url) {
        return None;
    }

    let mut path = url;
    path = path
        .strip_prefix("sqlite://")
        .or_else(|| path.strip_prefix("sqlite:"))
        .unwrap_or(path);
    path = path.strip_prefix("//").unwrap_or(path);
    path = path.strip_prefix("file:").unwrap_or(path);

    if let Some(idx) = path.find('?') {
        path = &path[..idx];
    }

    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    // On Windows: strip leading slash before drive letter ("/C:/...")
    if path.len() > 2 && path.starts_with('/') && path.as_bytes().get(2) == Some(&b':') {
        Some(&path[1..])
    } else {
        Some(path)
    }
}

fn ensure_sqlite_parent_dir(database_url: &str) -> Result<(), DbConnectionError> {
    use std::fs::create_dir_all;
    use std::path::Path;

    let Some(clean_path) = extract_path(database_url) else {
        return Ok(());
    };

    let db_path = Path::new(clean_path);
    if let Some(parent) = db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && !p.exists())
    {
        create_dir_all(parent).map_err(|source| DbConnectionError::CreateDirectory {
            path: parent.display().to_string(),
            source,
        })?;
    }

    Ok(())
}
