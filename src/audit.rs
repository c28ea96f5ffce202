//! Append-only audit trail of sensitive mutations.
//!
//! Recording is best-effort: [`record`] never returns an error, so the
//! business operation that triggered it succeeds or fails on its own.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{self, AuthContext, RequestIdentity};
use crate::directory::MemberDirectory;
use crate::storage::models::{AuditAction, AuditEntry, ClientInfo, EntityType};
use crate::storage::{Database, DatabaseError};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// Actor name used when a PIN session acts without a member signal
pub const PIN_ACTOR_NAME: &str = "Parent (PIN)";

/// One audit event, built by the caller
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub client: Option<ClientInfo>,
    pub description: Option<String>,
    pub entity_id: String,
    pub entity_type: EntityType,
    pub new_value: Option<serde_json::Value>,
    pub old_value: Option<serde_json::Value>,
    pub performed_by: Option<String>,
    pub performed_by_name: Option<String>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self {
            action,
            client: None,
            description: None,
            entity_id: entity_id.into(),
            entity_type,
            new_value: None,
            old_value: None,
            performed_by: None,
            performed_by_name: None,
        }
    }

    /// Snapshot of the state before the change
    pub fn old_value<T: Serialize>(mut self, value: &T) -> Self {
        self.old_value = snapshot(value);
        self
    }

    /// Snapshot of the state after the change
    pub fn new_value<T: Serialize>(mut self, value: &T) -> Self {
        self.new_value = snapshot(value);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn performed_by(mut self, id: impl Into<String>, name: Option<String>) -> Self {
        self.performed_by = Some(id.into());
        self.performed_by_name = name;
        self
    }

    /// Attribute the record to a context resolved earlier, e.g. before the
    /// operation revoked the session that authorized it
    pub fn actor(mut self, context: &AuthContext) -> Self {
        self.performed_by = context.member_id.clone();
        self.performed_by_name = match &context.member_name {
            Some(name) => Some(name.clone()),
            None if context.is_pin_authenticated => Some(PIN_ACTOR_NAME.to_string()),
            None => None,
        };
        self
    }

    pub fn client(mut self, client: ClientInfo) -> Self {
        self.client = Some(client);
        self
    }
}

fn snapshot<T: Serialize>(value: &T) -> Option<serde_json::Value> {
    match serde_json::to_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(error = %e, "Could not snapshot audit value");
            None
        }
    }
}

/// Record an audit event. Failures are logged and swallowed.
///
/// When the record has no actor, one is derived from `identity`.
pub fn record(
    db: &Database,
    directory: &dyn MemberDirectory,
    identity: Option<&RequestIdentity>,
    record: AuditRecord,
    now: DateTime<Utc>,
) -> Option<AuditEntry> {
    let entry = build_entry(db, directory, identity, record, now);
    persist(entry, |entry| db.append_audit_entry(entry))
}

fn build_entry(
    db: &Database,
    directory: &dyn MemberDirectory,
    identity: Option<&RequestIdentity>,
    record: AuditRecord,
    now: DateTime<Utc>,
) -> AuditEntry {
    let (performed_by, performed_by_name) = match (record.performed_by, identity) {
        (Some(id), _) => (Some(id), record.performed_by_name),
        (None, Some(identity)) => {
            let ctx = context::resolve(db, directory, identity, now);
            match ctx.member_id {
                Some(id) => (Some(id), ctx.member_name),
                None if ctx.is_pin_authenticated => (None, Some(PIN_ACTOR_NAME.to_string())),
                None => (None, record.performed_by_name),
            }
        }
        (None, None) => (None, record.performed_by_name),
    };

    let client = record.client.unwrap_or_default();
    AuditEntry {
        action: record.action,
        created_at: now,
        description: record.description,
        entity_id: record.entity_id,
        entity_type: record.entity_type,
        id: uuid::Uuid::new_v4().to_string(),
        ip_address: client.ip_address,
        new_value: record.new_value,
        old_value: record.old_value,
        performed_by,
        performed_by_name,
        user_agent: client.user_agent,
    }
}

/// Hand `entry` to `append`, logging instead of propagating a failure
fn persist<F>(entry: AuditEntry, append: F) -> Option<AuditEntry>
where
    F: FnOnce(&AuditEntry) -> Result<(), DatabaseError>,
{
    match append(&entry) {
        Ok(()) => {
            tracing::debug!(
                action = %entry.action,
                entity_type = %entry.entity_type,
                entity_id = %entry.entity_id,
                "Audit entry recorded"
            );
            Some(entry)
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                action = %entry.action,
                entity_type = %entry.entity_type,
                entity_id = %entry.entity_id,
                "Failed to write audit entry"
            );
            None
        }
    }
}

/// Filters for [`recent`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub action: Option<AuditAction>,
    pub entity_type: Option<EntityType>,
    pub limit: Option<usize>,
    pub performed_by: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

fn effective_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Audit entries for one entity, newest first
pub fn history(
    db: &Database,
    entity_type: EntityType,
    entity_id: &str,
    limit: Option<usize>,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    db.get_audit_history(entity_type, entity_id, effective_limit(limit))
}

/// Latest audit entries matching the query, newest first
pub fn recent(db: &Database, query: &AuditQuery) -> Result<Vec<AuditEntry>, DatabaseError> {
    db.scan_audit_entries(query.since, effective_limit(query.limit), |entry| {
        query.entity_type.map_or(true, |t| entry.entity_type == t)
            && query.action.map_or(true, |a| entry.action == a)
            && query
                .performed_by
                .as_deref()
                .map_or(true, |p| entry.performed_by.as_deref() == Some(p))
    })
}

/// Delete entries older than `days_to_keep` days. Returns how many were removed.
pub fn cleanup(db: &Database, days_to_keep: u32, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
    let cutoff = now - Duration::days(i64::from(days_to_keep));
    let removed = db.delete_audit_entries_before(cutoff)?;

    if removed > 0 {
        tracing::info!(count = removed, days_to_keep, "Cleaned up old audit entries");
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::testutil::{setup_db, test_directory};
    use crate::tokens::session;
    use serde_json::json;

    #[test]
    fn test_record_persists_snapshots_and_client() {
        let (db, _temp) = setup_db();
        let now = Utc::now();

        let entry = record(
            &db,
            &StaticDirectory::default(),
            None,
            AuditRecord::new(AuditAction::Award, EntityType::Points, "kid")
                .old_value(&json!({"balance": 10}))
                .new_value(&json!({"balance": 15}))
                .description("Awarded 5 points")
                .performed_by("mom", Some("Alex".to_string()))
                .client(ClientInfo {
                    ip_address: Some("10.0.0.7".to_string()),
                    user_agent: Some("tablet".to_string()),
                }),
            now,
        )
        .unwrap();

        let stored = history(&db, EntityType::Points, "kid", None).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, entry.id);
        assert_eq!(stored[0].new_value, Some(json!({"balance": 15})));
        assert_eq!(stored[0].old_value, Some(json!({"balance": 10})));
        assert_eq!(stored[0].performed_by.as_deref(), Some("mom"));
        assert_eq!(stored[0].ip_address.as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn test_record_derives_actor_from_identity() {
        let (db, _temp) = setup_db();
        let directory = test_directory();
        let now = Utc::now();

        let entry = record(
            &db,
            &directory,
            Some(&RequestIdentity::with_member("kid")),
            AuditRecord::new(AuditAction::Complete, EntityType::Chore, "dishes"),
            now,
        )
        .unwrap();
        assert_eq!(entry.performed_by.as_deref(), Some("kid"));
        assert_eq!(entry.performed_by_name.as_deref(), Some("Sam"));

        let s = session::create(&db, Duration::hours(1), now).unwrap();
        let entry = record(
            &db,
            &directory,
            Some(&RequestIdentity::with_session(s.token)),
            AuditRecord::new(AuditAction::SettingsChange, EntityType::Settings, "theme"),
            now,
        )
        .unwrap();
        assert!(entry.performed_by.is_none());
        assert_eq!(entry.performed_by_name.as_deref(), Some(PIN_ACTOR_NAME));
    }

    #[test]
    fn test_explicit_actor_wins_over_identity() {
        let (db, _temp) = setup_db();
        let entry = record(
            &db,
            &test_directory(),
            Some(&RequestIdentity::with_member("kid")),
            AuditRecord::new(AuditAction::Approve, EntityType::Reward, "r1")
                .performed_by("mom", None),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(entry.performed_by.as_deref(), Some("mom"));
    }

    #[test]
    fn test_recent_filters_and_orders() {
        let (db, _temp) = setup_db();
        let directory = StaticDirectory::default();
        let base = Utc::now() - Duration::hours(5);

        let events = [
            (AuditAction::Create, EntityType::Task, "mom"),
            (AuditAction::Complete, EntityType::Task, "kid"),
            (AuditAction::Award, EntityType::Points, "mom"),
            (AuditAction::Complete, EntityType::Chore, "kid"),
        ];
        for (i, (action, entity, actor)) in events.into_iter().enumerate() {
            record(
                &db,
                &directory,
                None,
                AuditRecord::new(action, entity, "x").performed_by(actor, None),
                base + Duration::hours(i as i64),
            );
        }

        let all = recent(&db, &AuditQuery::default()).unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(all[0].entity_type, EntityType::Chore);

        let by_kid = recent(
            &db,
            &AuditQuery {
                performed_by: Some("kid".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_kid.len(), 2);

        let tasks = recent(
            &db,
            &AuditQuery {
                entity_type: Some(EntityType::Task),
                action: Some(AuditAction::Complete),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(tasks.len(), 1);

        let since = recent(
            &db,
            &AuditQuery {
                since: Some(base + Duration::minutes(90)),
                limit: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].action, AuditAction::Complete);
    }

    #[test]
    fn test_cleanup_keeps_recent_entries() {
        let (db, _temp) = setup_db();
        let directory = StaticDirectory::default();
        let now = Utc::now();

        for days_ago in [120, 91, 89, 1] {
            record(
                &db,
                &directory,
                None,
                AuditRecord::new(AuditAction::Update, EntityType::Member, "m"),
                now - Duration::days(days_ago),
            );
        }

        assert_eq!(cleanup(&db, DEFAULT_RETENTION_DAYS, now).unwrap(), 2);
        let left = history(&db, EntityType::Member, "m", None).unwrap();
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|e| e.created_at > now - Duration::days(90)));
    }

    #[test]
    fn test_failed_write_is_swallowed_and_login_stands() {
        let (db, _temp) = setup_db();
        let directory = test_directory();
        let config = crate::testutil::test_config();
        let now = Utc::now();
        crate::pin::manager::setup(&db, "1234", "1234", now).unwrap();

        let session = match crate::pin::manager::verify(&db, &config, "1234", now).unwrap() {
            crate::pin::VerifyOutcome::Verified(session) => session,
            other => panic!("expected verification, got {other:?}"),
        };

        let entry = build_entry(
            &db,
            &directory,
            Some(&RequestIdentity::with_session(session.token.clone())),
            AuditRecord::new(AuditAction::Login, EntityType::Session, "pin"),
            now,
        );
        let written = persist(entry, |_| {
            Err(DatabaseError::Io(std::io::Error::other("disk full")))
        });

        assert!(written.is_none());
        assert_eq!(db.count_audit_entries().unwrap(), 0);
        assert!(session::validate(&db, &session.token, now).unwrap());
    }

    #[test]
    fn test_persist_returns_entry_on_success() {
        let (db, _temp) = setup_db();
        let entry = build_entry(
            &db,
            &StaticDirectory::default(),
            None,
            AuditRecord::new(AuditAction::Create, EntityType::Task, "t1"),
            Utc::now(),
        );
        let id = entry.id.clone();

        let written = persist(entry, |entry| db.append_audit_entry(entry)).unwrap();
        assert_eq!(written.id, id);
        assert_eq!(db.count_audit_entries().unwrap(), 1);
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(effective_limit(None), DEFAULT_LIMIT);
        assert_eq!(effective_limit(Some(0)), 1);
        assert_eq!(effective_limit(Some(10_000)), MAX_LIMIT);
    }
}
