//! Failed-attempt lockout, evaluated lazily against the stored credential.
//!
//! There is no timer: a lockout ends when `locked_until` falls into the past
//! and the next call observes it. Only a successful verification resets the
//! counter, so after an expired lockout a single further failure locks again.

use chrono::{DateTime, Utc};

use crate::storage::models::Credential;

/// Current lockout state of the credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked { until: DateTime<Utc> },
}

pub fn state(credential: &Credential, now: DateTime<Utc>) -> LockState {
    match credential.locked_until {
        Some(until) if until > now => LockState::Locked { until },
        _ => LockState::Unlocked,
    }
}

pub fn is_locked_out(credential: &Credential, now: DateTime<Utc>) -> bool {
    matches!(state(credential, now), LockState::Locked { .. })
}

/// Whole seconds until the lockout ends, rounded up, or 0 when unlocked
pub fn remaining_seconds(credential: &Credential, now: DateTime<Utc>) -> i64 {
    match state(credential, now) {
        LockState::Locked { until } => {
            let millis = (until - now).num_milliseconds();
            (millis + 999) / 1000
        }
        LockState::Unlocked => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::make_credential;
    use chrono::Duration;

    #[test]
    fn test_unlocked_without_deadline() {
        let now = Utc::now();
        let credential = make_credential(now);
        assert!(!is_locked_out(&credential, now));
        assert_eq!(remaining_seconds(&credential, now), 0);
    }

    #[test]
    fn test_locked_until_deadline_passes() {
        let now = Utc::now();
        let mut credential = make_credential(now);
        credential.locked_until = Some(now + Duration::minutes(15));

        assert_eq!(
            state(&credential, now),
            LockState::Locked {
                until: now + Duration::minutes(15)
            }
        );
        assert_eq!(remaining_seconds(&credential, now), 900);
        assert_eq!(
            remaining_seconds(&credential, now + Duration::milliseconds(500)),
            900
        );
        assert_eq!(
            remaining_seconds(&credential, now + Duration::minutes(14)),
            60
        );

        // Lazy expiry: at the deadline the lock is gone
        let deadline = now + Duration::minutes(15);
        assert!(!is_locked_out(&credential, deadline));
        assert_eq!(remaining_seconds(&credential, deadline), 0);
    }

    #[test]
    fn test_deadline_in_past_is_unlocked() {
        let now = Utc::now();
        let mut credential = make_credential(now);
        credential.locked_until = Some(now - Duration::seconds(1));
        assert_eq!(state(&credential, now), LockState::Unlocked);
    }
}
