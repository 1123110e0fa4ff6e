//! crates/santri_core/src/error.rs
//!
//! The error taxonomy returned by domain operations.

use uuid::Uuid;

use crate::ports::PortError;

/// Errors raised by the attendance, hafalan and halaqoh operations.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Malformed or missing input. Never retried.
    #[error("{0}")]
    Validation(String),

    /// The caller's role lacks the required capability.
    #[error("{0}")]
    Authorization(String),

    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The submission already left the `pending` state.
    #[error("submission {0} has already been reviewed")]
    AlreadyReviewed(Uuid),

    /// Persistence failure propagated from the store.
    #[error("store error: {0}")]
    Store(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<PortError> for DomainError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => DomainError::NotFound(msg),
            PortError::Conflict(msg) => DomainError::Validation(msg),
            PortError::Unauthorized => DomainError::Authorization("unauthorized".to_string()),
            PortError::Unexpected(msg) => DomainError::Store(msg),
        }
    }
}
