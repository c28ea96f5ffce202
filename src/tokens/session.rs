use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::storage::models::Session;
use crate::storage::Database;

use super::generator::generate_token;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Database error: {0}")]
    Database(#[from] crate::storage::DatabaseError),
}

/// Create a new session that expires `ttl` after `now`
pub fn create(db: &Database, ttl: Duration, now: DateTime<Utc>) -> Result<Session, SessionError> {
    let session = Session {
        created_at: now,
        expires_at: now + ttl,
        token: generate_token(),
    };

    db.put_session(&session)?;
    tracing::debug!(expires_at = %session.expires_at, "Created session");

    Ok(session)
}

/// Check a session token.
///
/// Unknown tokens are invalid. An expired session is deleted on the spot and
/// reported invalid; validation never extends the expiry.
pub fn validate(db: &Database, token: &str, now: DateTime<Utc>) -> Result<bool, SessionError> {
    if token.is_empty() {
        return Ok(false);
    }

    match db.get_session(token)? {
        Some(session) if session.is_expired_at(now) => {
            if let Err(e) = db.delete_session(token) {
                tracing::warn!(error = %e, "Failed to delete expired session");
            }
            tracing::debug!(expired_at = %session.expires_at, "Session expired");
            Ok(false)
        }
        Some(_) => Ok(true),
        None => Ok(false),
    }
}

/// Delete a session. Deleting an unknown token is not an error.
pub fn delete(db: &Database, token: &str) -> Result<bool, SessionError> {
    let deleted = db.delete_session(token)?;
    if deleted {
        tracing::debug!("Deleted session");
    }
    Ok(deleted)
}

/// Delete every session (PIN changed or protection disabled)
pub fn revoke_all(db: &Database) -> Result<usize, SessionError> {
    let revoked = db.delete_all_sessions()?;
    if revoked > 0 {
        tracing::info!(count = revoked, "Revoked all sessions");
    }
    Ok(revoked)
}

/// Clean up expired sessions (called by an outside scheduler)
pub fn cleanup_expired(db: &Database, now: DateTime<Utc>) -> Result<usize, SessionError> {
    let cleaned = db.delete_expired_sessions(now)?;

    if cleaned > 0 {
        tracing::info!(count = cleaned, "Cleaned up expired sessions");
    }

    Ok(cleaned)
}
