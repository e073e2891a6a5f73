/// Storage error shared by every persistence backend
///
/// Postgres, Redis and the in-memory stores all report failures through
/// [`StoreError`] so the layers above never depend on a concrete driver.
use thiserror::Error;

/// SQLSTATEs for serialization failure and deadlock
const CONTENTION_CODES: &[&str] = &["40001", "40P01"];

#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique constraint rejected the write
    #[error("Conflict on {0}")]
    Conflict(String),

    /// The database aborted the transaction in favor of a concurrent one
    #[error("Transaction aborted by a concurrent writer ({0})")]
    Contention(String),

    /// Database driver error
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Redis command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unique").to_string();
                return StoreError::Conflict(constraint);
            }
            if let Some(code) = db_err.code().map(|c| c.into_owned()) {
                if CONTENTION_CODES.contains(&code.as_str()) {
                    return StoreError::Contention(code);
                }
            }
        }
        StoreError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_is_database_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_conflict_display() {
        let err = StoreError::Conflict("users_email_key".to_string());
        assert_eq!(err.to_string(), "Conflict on users_email_key");
    }
}
