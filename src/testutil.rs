//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use crate::config::Config;
use crate::directory::{Member, StaticDirectory};
use crate::storage::models::{AuditAction, AuditEntry, Credential, EntityType, Session};
use crate::storage::Database;
use crate::AppState;

/// Open a fresh database in a temporary directory.
///
/// Returns both the `Database` and the `TempDir` guard. The caller must
/// keep the `TempDir` alive for the duration of the test.
pub fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (db, temp_dir)
}

/// Default configuration pointed at a throwaway data dir
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.bind_address = "127.0.0.1:8080".to_string();
    config.server.data_dir = "/tmp/test".to_string();
    config
}

/// Household used across tests: a parent, a child and a member whose role
/// the permission model does not know.
pub fn test_directory() -> StaticDirectory {
    StaticDirectory::new([
        Member {
            id: "mom".to_string(),
            name: "Alex".to_string(),
            role: "PARENT".to_string(),
        },
        Member {
            id: "kid".to_string(),
            name: "Sam".to_string(),
            role: "CHILD".to_string(),
        },
        Member {
            id: "grandpa".to_string(),
            name: "Joe".to_string(),
            role: "GRANDPARENT".to_string(),
        },
    ])
}

/// Build a full `Arc<AppState>` around the given database.
pub fn test_state(db: Database) -> Arc<AppState> {
    Arc::new(AppState {
        config: test_config(),
        db,
        directory: Arc::new(test_directory()),
    })
}

/// An enabled credential with no failures. The hash is a placeholder, so
/// use `pin::manager::setup` when a test needs a PIN that verifies.
pub fn make_credential(now: DateTime<Utc>) -> Credential {
    Credential {
        enabled: true,
        failed_attempts: 0,
        locked_until: None,
        pin_hash: Some("$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2g".to_string()),
        updated_at: now,
    }
}

/// Create a `Session` whose token is `tok_{id}`.
pub fn make_session(id: &str, expires_at: DateTime<Utc>) -> Session {
    Session {
        created_at: expires_at - chrono::Duration::hours(24),
        expires_at,
        token: format!("tok_{id}"),
    }
}

pub fn make_audit_entry(
    action: AuditAction,
    entity_type: EntityType,
    entity_id: &str,
    created_at: DateTime<Utc>,
) -> AuditEntry {
    AuditEntry {
        action,
        created_at,
        description: None,
        entity_id: entity_id.to_string(),
        entity_type,
        id: uuid::Uuid::new_v4().to_string(),
        ip_address: None,
        new_value: None,
        old_value: None,
        performed_by: None,
        performed_by_name: None,
        user_agent: None,
    }
}
