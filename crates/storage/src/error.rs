use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached (pool exhausted or closed, I/O).
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// A create-only write found the document already present.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("malformed document: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("document store failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(value.to_string())
            }
            sqlx::Error::RowNotFound => Self::NotFound(value.to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Self::AlreadyExists(db.message().to_string())
            }
            other => Self::Backend(other.to_string()),
        }
    }
}
