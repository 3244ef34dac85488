use crate::db::schema::SQLITE_INIT;
use crate::error::CacheError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use tracing::info;

/// Open (or create) the SQLite database and apply the schema.
pub async fn connect(database_url: &str, busy_timeout: Duration) -> Result<SqlitePool, CacheError> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(busy_timeout)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .connect_with(connect_opts)
        .await?;

    apply_schema(&pool).await?;

    info!(database_url, "metadata store initialized");
    Ok(pool)
}

pub async fn apply_schema(pool: &SqlitePool) -> Result<(), CacheError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
