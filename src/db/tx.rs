//! Transaction provider consumed by the cache.
//!
//! Conflict handling and retries belong to the provider; the cache only asks
//! for a transaction and commits it when it opened it itself.

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};

pub type StoreTx = Transaction<'static, Sqlite>;

#[async_trait]
pub trait TransactionProvider: Send + Sync {
    async fn begin(&self) -> Result<StoreTx, sqlx::Error>;
}

#[async_trait]
impl TransactionProvider for SqlitePool {
    async fn begin(&self) -> Result<StoreTx, sqlx::Error> {
        sqlx::Pool::begin(self).await
    }
}
