use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::error::AccessError;
use crate::storage::models::{Credential, Session};
use crate::storage::Database;
use crate::tokens::session;

use super::{hash, lockout};

/// Public view of the PIN configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinStatus {
    pub configured: bool,
    pub enabled: bool,
    pub locked: bool,
    pub lockout_remaining: i64,
}

/// Result of a verification attempt
#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    Verified(Session),
    Rejected {
        locked: bool,
        lockout_remaining: i64,
        /// This attempt is the one that tripped the lockout
        lockout_started: bool,
    },
}

impl VerifyOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerifyOutcome::Verified(_))
    }
}

pub fn status(db: &Database, now: DateTime<Utc>) -> Result<PinStatus, AccessError> {
    let status = match db.get_credential()? {
        Some(credential) => PinStatus {
            configured: credential.is_configured(),
            enabled: credential.enabled,
            locked: lockout::is_locked_out(&credential, now),
            lockout_remaining: lockout::remaining_seconds(&credential, now),
        },
        None => PinStatus {
            configured: false,
            enabled: false,
            locked: false,
            lockout_remaining: 0,
        },
    };
    Ok(status)
}

/// First-time PIN setup. Refuses to overwrite an existing PIN.
pub fn setup(
    db: &Database,
    pin: &str,
    confirm_pin: &str,
    now: DateTime<Utc>,
) -> Result<(), AccessError> {
    check_new_pin(pin, confirm_pin)?;

    let credential = Credential {
        enabled: true,
        failed_attempts: 0,
        locked_until: None,
        pin_hash: Some(hash::hash(pin)?),
        updated_at: now,
    };
    if !db.setup_credential_if_absent(&credential)? {
        return Err(AccessError::validation(
            "A PIN is already configured. Change it instead.",
        ));
    }

    tracing::info!("PIN protection set up");
    Ok(())
}

/// Verify the household PIN and issue a session on success.
///
/// A missing PIN is answered exactly like a wrong one.
pub fn verify(
    db: &Database,
    config: &Config,
    pin: &str,
    now: DateTime<Utc>,
) -> Result<VerifyOutcome, AccessError> {
    let credential = match db.get_credential()? {
        Some(credential) if credential.is_configured() => credential,
        _ => {
            tracing::debug!("PIN verification attempted with no PIN configured");
            return Ok(VerifyOutcome::Rejected {
                locked: false,
                lockout_remaining: 0,
                lockout_started: false,
            });
        }
    };

    if lockout::is_locked_out(&credential, now) {
        return Ok(VerifyOutcome::Rejected {
            locked: true,
            lockout_remaining: lockout::remaining_seconds(&credential, now),
            lockout_started: false,
        });
    }

    if matches_stored(pin, &credential) {
        db.reset_pin_failures(now)?;
        let session = session::create(db, config.tokens.session_ttl(), now)?;
        tracing::info!("PIN verified, session issued");
        return Ok(VerifyOutcome::Verified(session));
    }

    let updated = register_failure(db, config, now)?;
    let locked = updated
        .as_ref()
        .is_some_and(|c| lockout::is_locked_out(c, now));
    Ok(VerifyOutcome::Rejected {
        locked,
        lockout_remaining: updated
            .as_ref()
            .map(|c| lockout::remaining_seconds(c, now))
            .unwrap_or(0),
        lockout_started: locked,
    })
}

/// Replace the PIN. The current PIN must verify; all sessions are revoked.
pub fn change(
    db: &Database,
    config: &Config,
    current_pin: &str,
    new_pin: &str,
    confirm_pin: &str,
    now: DateTime<Utc>,
) -> Result<(), AccessError> {
    check_new_pin(new_pin, confirm_pin)?;
    if !hash::is_valid_format(current_pin) {
        return Err(AccessError::validation("Current PIN is incorrect"));
    }

    let mut credential = check_current_pin(db, config, current_pin, now)?;
    credential.pin_hash = Some(hash::hash(new_pin)?);
    credential.enabled = true;
    credential.failed_attempts = 0;
    credential.locked_until = None;
    credential.updated_at = now;
    db.put_credential(&credential)?;

    session::revoke_all(db)?;
    tracing::info!("PIN changed");
    Ok(())
}

/// Turn PIN protection off. The current PIN must verify; all sessions are revoked.
pub fn disable(
    db: &Database,
    config: &Config,
    pin: &str,
    now: DateTime<Utc>,
) -> Result<(), AccessError> {
    if !hash::is_valid_format(pin) {
        return Err(AccessError::validation("PIN must be 4 to 6 digits"));
    }

    let mut credential = check_current_pin(db, config, pin, now)?;
    credential.pin_hash = None;
    credential.enabled = false;
    credential.failed_attempts = 0;
    credential.locked_until = None;
    credential.updated_at = now;
    db.put_credential(&credential)?;

    session::revoke_all(db)?;
    tracing::info!("PIN protection disabled");
    Ok(())
}

/// End a session. Unknown tokens are ignored.
pub fn logout(db: &Database, token: &str) -> Result<bool, AccessError> {
    Ok(session::delete(db, token)?)
}

/// Whether the PIN gate is active (a PIN is configured and enabled)
pub fn is_protection_enabled(db: &Database) -> Result<bool, AccessError> {
    Ok(db
        .get_credential()?
        .is_some_and(|c| c.enabled && c.is_configured()))
}

// ============================================================================
// Helpers
// ============================================================================

fn check_new_pin(pin: &str, confirm_pin: &str) -> Result<(), AccessError> {
    if pin != confirm_pin {
        return Err(AccessError::validation("PINs do not match"));
    }
    if !hash::is_valid_format(pin) {
        return Err(AccessError::validation("PIN must be 4 to 6 digits"));
    }
    Ok(())
}

fn matches_stored(pin: &str, credential: &Credential) -> bool {
    credential
        .pin_hash
        .as_deref()
        .is_some_and(|stored| hash::verify(pin, stored))
}

/// Count a failed attempt, logging when it trips the lockout
fn register_failure(
    db: &Database,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<Option<Credential>, AccessError> {
    let updated =
        db.record_failed_pin_attempt(now, config.pin.max_attempts, config.pin.lockout())?;

    if let Some(ref credential) = updated {
        if lockout::is_locked_out(credential, now) {
            tracing::warn!(
                failed_attempts = credential.failed_attempts,
                locked_until = ?credential.locked_until,
                "PIN locked after repeated failures"
            );
        } else {
            tracing::warn!(
                failed_attempts = credential.failed_attempts,
                "PIN verification failed"
            );
        }
    }
    Ok(updated)
}

/// Gate for change/disable: honours the lockout and counts failures
fn check_current_pin(
    db: &Database,
    config: &Config,
    pin: &str,
    now: DateTime<Utc>,
) -> Result<Credential, AccessError> {
    let credential = match db.get_credential()? {
        Some(credential) if credential.is_configured() => credential,
        _ => return Err(AccessError::validation("PIN protection is not set up")),
    };

    if lockout::is_locked_out(&credential, now) {
        return Err(AccessError::LockedOut {
            remaining_seconds: lockout::remaining_seconds(&credential, now),
        });
    }

    if !matches_stored(pin, &credential) {
        let updated = register_failure(db, config, now)?;
        if let Some(ref c) = updated {
            if lockout::is_locked_out(c, now) {
                return Err(AccessError::LockedOut {
                    remaining_seconds: lockout::remaining_seconds(c, now),
                });
            }
        }
        return Err(AccessError::validation("Current PIN is incorrect"));
    }

    Ok(credential)
}
