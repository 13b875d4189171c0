use thiserror::Error;

use shopdesk_core::DomainError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by catalog stores and the repository facade.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    /// Unique constraint hit (duplicate product code).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Backend failure (SQL error, closed pool, poisoned lock).
    #[error("database error: {0}")]
    Database(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                StoreError::Validation(msg)
            }
            DomainError::Configuration(msg) => StoreError::Database(msg),
        }
    }
}
