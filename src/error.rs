use thiserror::Error;

use crate::permissions::Permission;
use crate::storage::DatabaseError;
use crate::tokens::session::SessionError;

/// Failures surfaced by the access-control operations.
///
/// Only `Persistence` and `Hashing` are unexpected faults; the rest are
/// ordinary outcomes a caller turns into a 4xx response.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("PIN authentication required")]
    AuthenticationRequired,
    #[error("session expired")]
    AuthenticationExpired,
    #[error("permission denied: {permission}")]
    AuthorizationDenied { permission: Permission },
    #[error("too many failed attempts, try again in {remaining_seconds} seconds")]
    LockedOut { remaining_seconds: i64 },
    #[error("{0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Persistence(#[from] DatabaseError),
    #[error("PIN hashing failed: {0}")]
    Hashing(String),
}

impl AccessError {
    pub fn validation(message: impl Into<String>) -> Self {
        AccessError::Validation(message.into())
    }
}

impl From<SessionError> for AccessError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Database(db) => AccessError::Persistence(db),
        }
    }
}
