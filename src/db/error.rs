use thiserror::Error;

use crate::models::ValidationError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures of a gateway operation. A missing record is not an error; lookups
/// return `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Database connection is not available")]
    Unavailable,

    #[error("Database lock poisoned")]
    Poisoned,

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),
}
