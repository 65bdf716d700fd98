//! Storage-specific error type wrapping sqlx errors.

use taskflow_domain::error::TaskflowError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize a JSON column.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A counter does not fit the column type.
    #[error("counter overflow on `{0}`")]
    Overflow(&'static str),
}

impl From<StorageError> for TaskflowError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
