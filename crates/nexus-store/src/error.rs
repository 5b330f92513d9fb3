use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid stored value: {0}")]
    Corrupt(String),
}
