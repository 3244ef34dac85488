use metacache_entity::EntityKind;
use thiserror::Error as ThisError;
use tracing::error;

use super::IsRetryable;

/// Errors surfaced by the cache layer. Nothing here is retried internally.
#[derive(Debug, ThisError)]
pub enum CacheError {
    /// The relevant scope is fully loaded and the entity is not in it.
    #[error("{kind} not found: {what}")]
    NotFound { kind: EntityKind, what: String },

    /// A full view was composed before one of its dependencies was loaded.
    #[error("Cache integrity fault: {0}")]
    Integrity(String),

    #[error("Failed to {op} {kind}: {source}")]
    Store {
        kind: EntityKind,
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

impl CacheError {
    pub fn not_found(kind: EntityKind, what: impl Into<String>) -> Self {
        CacheError::NotFound {
            kind,
            what: what.into(),
        }
    }

    /// Builds an integrity fault and logs it; these are programming defects.
    pub fn integrity(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(fault = %message, "cache integrity fault");
        CacheError::Integrity(message)
    }

    pub fn store(kind: EntityKind, op: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| CacheError::Store { kind, op, source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }
}

impl IsRetryable for CacheError {
    fn is_retryable(&self) -> bool {
        match self {
            CacheError::Store { source, .. } | CacheError::Database(source) => {
                sqlx_is_transient(source)
            }
            CacheError::NotFound { .. } | CacheError::Integrity(_) | CacheError::Json(_) => false,
        }
    }
}

// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes.
fn sqlx_is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, 5 | 6)),
        _ => false,
    }
}
