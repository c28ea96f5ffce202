use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::AccessError;

pub const MIN_PIN_LENGTH: usize = 4;
pub const MAX_PIN_LENGTH: usize = 6;

/// Hash a PIN with Argon2id and a fresh random salt.
///
/// Returns the PHC string, which carries the algorithm parameters.
pub fn hash(pin: &str) -> Result<String, AccessError> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AccessError::Hashing(e.to_string()))
}

/// Check a PIN against a stored PHC hash. Unparseable hashes never match.
pub fn verify(pin: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored PIN hash is malformed");
            return false;
        }
    };

    Argon2::default()
        .verify_password(pin.as_bytes(), &parsed)
        .is_ok()
}

/// 4 to 6 ASCII digits, nothing else
pub fn is_valid_format(pin: &str) -> bool {
    (MIN_PIN_LENGTH..=MAX_PIN_LENGTH).contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hashed = hash("1234").unwrap();
        assert!(hashed.starts_with("$argon2id$"));
        assert!(verify("1234", &hashed));
        assert!(!verify("4321", &hashed));
    }

    #[test]
    fn test_hash_is_salted() {
        let a = hash("1234").unwrap();
        let b = hash("1234").unwrap();
        assert_ne!(a, b);
        assert!(verify("1234", &a) && verify("1234", &b));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify("1234", ""));
        assert!(!verify("1234", "1234"));
        assert!(!verify("1234", "$argon2id$garbage"));
    }

    #[test]
    fn test_format_rules() {
        for ok in ["1234", "00000", "987654"] {
            assert!(is_valid_format(ok), "{ok} should be valid");
        }
        for bad in ["", "123", "1234567", "12a4", " 1234", "12 34", "١٢٣٤", "-123"] {
            assert!(!is_valid_format(bad), "{bad:?} should be invalid");
        }
    }
}
