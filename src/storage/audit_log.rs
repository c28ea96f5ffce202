use chrono::{DateTime, Utc};
use redb::{ReadableTable, ReadableTableMetadata};

use super::db::{time_key, Database, DatabaseError};
use super::models::{AuditEntry, EntityType};
use super::tables::*;

/// Prefix of the entity index for one entity: "{entity_type}/{entity_id}/"
fn entity_prefix(entity_type: EntityType, entity_id: &str) -> String {
    format!("{entity_type}/{entity_id}/")
}

impl Database {
    // ========================================================================
    // Audit log operations
    // ========================================================================

    /// Append an audit entry. Entries are never rewritten.
    pub fn append_audit_entry(&self, entry: &AuditEntry) -> Result<(), DatabaseError> {
        debug_assert!(!entry.id.is_empty(), "audit entry id must not be empty");

        let log_key = time_key(&entry.created_at, &entry.id);
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(AUDIT_LOG)?;
            let data = rmp_serde::to_vec_named(entry)?;
            table.insert(log_key.as_str(), data.as_slice())?;

            let mut index_table = write_txn.open_table(AUDIT_BY_ENTITY)?;
            let index_key = format!(
                "{}{log_key}",
                entity_prefix(entry.entity_type, &entry.entity_id)
            );
            index_table.insert(index_key.as_str(), log_key.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Entries for one entity, newest first
    pub fn get_audit_history(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index_table = read_txn.open_table(AUDIT_BY_ENTITY)?;
        let log_table = read_txn.open_table(AUDIT_LOG)?;

        let start = entity_prefix(entity_type, entity_id);
        // Time keys start with digits, so '~' bounds every key under the prefix
        let end = format!("{start}~");

        let mut entries = Vec::new();
        for item in index_table.range(start.as_str()..end.as_str())?.rev() {
            if entries.len() >= limit {
                break;
            }
            let (_, log_key) = item?;
            if let Some(data) = log_table.get(log_key.value())? {
                let entry: AuditEntry = rmp_serde::from_slice(data.value())?;
                // Ids containing '/' can share a prefix with another id
                if entry.entity_type == entity_type && entry.entity_id == entity_id {
                    entries.push(entry);
                }
            }
        }

        Ok(entries)
    }

    /// Walk the log newest first, keeping entries accepted by `keep`.
    ///
    /// With `since`, only entries created at or after that instant are visited.
    pub fn scan_audit_entries<F>(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
        mut keep: F,
    ) -> Result<Vec<AuditEntry>, DatabaseError>
    where
        F: FnMut(&AuditEntry) -> bool,
    {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(AUDIT_LOG)?;

        let start = since.map(|s| time_key(&s, "")).unwrap_or_default();

        let mut entries = Vec::new();
        for item in table.range(start.as_str()..)?.rev() {
            if entries.len() >= limit {
                break;
            }
            let (_, data) = item?;
            let entry: AuditEntry = rmp_serde::from_slice(data.value())?;
            if since.is_some_and(|s| entry.created_at < s) {
                continue;
            }
            if keep(&entry) {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    /// Delete entries created strictly before `cutoff`. Returns the count removed.
    pub fn delete_audit_entries_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        // Keys carry nanoseconds, so everything under this bound is older
        let end = time_key(&cutoff, "");

        let write_txn = self.begin_write()?;
        let mut removed = 0;
        {
            let table = write_txn.open_table(AUDIT_LOG)?;
            let mut doomed: Vec<(String, String)> = Vec::new();
            for item in table.range(..end.as_str())? {
                let (key, data) = item?;
                let entry: AuditEntry = rmp_serde::from_slice(data.value())?;
                if entry.created_at < cutoff {
                    let log_key = key.value().to_string();
                    let index_key = format!(
                        "{}{log_key}",
                        entity_prefix(entry.entity_type, &entry.entity_id)
                    );
                    doomed.push((log_key, index_key));
                }
            }
            drop(table);

            let mut table = write_txn.open_table(AUDIT_LOG)?;
            let mut index_table = write_txn.open_table(AUDIT_BY_ENTITY)?;
            for (log_key, index_key) in doomed {
                table.remove(log_key.as_str())?;
                index_table.remove(index_key.as_str())?;
                removed += 1;
            }
        }
        write_txn.commit()?;
        Ok(removed)
    }

    /// Total number of audit entries
    pub fn count_audit_entries(&self) -> Result<u64, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(AUDIT_LOG)?;
        Ok(table.len()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::AuditAction;
    use chrono::Duration;
    use crate::testutil::{make_audit_entry, setup_db};

    #[test]
    fn test_history_is_newest_first_and_scoped() {
        let (db, _temp) = setup_db();
        let base = Utc::now() - Duration::hours(1);

        for (i, id) in ["42", "42", "7", "42"].iter().enumerate() {
            let entry = make_audit_entry(
                AuditAction::Award,
                EntityType::Points,
                id,
                base + Duration::minutes(i as i64),
            );
            db.append_audit_entry(&entry).unwrap();
        }

        let history = db.get_audit_history(EntityType::Points, "42", 10).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history
            .windows(2)
            .all(|w| w[0].created_at > w[1].created_at));

        let limited = db.get_audit_history(EntityType::Points, "42", 2).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].created_at, history[0].created_at);
    }

    #[test]
    fn test_history_does_not_leak_prefix_sharing_ids() {
        let (db, _temp) = setup_db();
        let now = Utc::now();
        db.append_audit_entry(&make_audit_entry(
            AuditAction::Update,
            EntityType::Chore,
            "1/2",
            now,
        ))
        .unwrap();

        assert!(db
            .get_audit_history(EntityType::Chore, "1", 10)
            .unwrap()
            .is_empty());
        assert_eq!(
            db.get_audit_history(EntityType::Chore, "1/2", 10)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_scan_respects_since_and_filter() {
        let (db, _temp) = setup_db();
        let base = Utc::now() - Duration::days(3);
        for day in 0..3 {
            let action = if day == 1 {
                AuditAction::Delete
            } else {
                AuditAction::Create
            };
            db.append_audit_entry(&make_audit_entry(
                action,
                EntityType::Task,
                "t1",
                base + Duration::days(day),
            ))
            .unwrap();
        }

        let since = base + Duration::hours(12);
        let recent = db.scan_audit_entries(Some(since), 10, |_| true).unwrap();
        assert_eq!(recent.len(), 2);

        let creates = db
            .scan_audit_entries(None, 10, |e| e.action == AuditAction::Create)
            .unwrap();
        assert_eq!(creates.len(), 2);
        assert!(creates[0].created_at > creates[1].created_at);
    }

    #[test]
    fn test_delete_before_cutoff() {
        let (db, _temp) = setup_db();
        let now = Utc::now();
        let old = make_audit_entry(
            AuditAction::Create,
            EntityType::Reward,
            "r1",
            now - Duration::days(100),
        );
        let kept = make_audit_entry(
            AuditAction::Create,
            EntityType::Reward,
            "r1",
            now - Duration::days(10),
        );
        db.append_audit_entry(&old).unwrap();
        db.append_audit_entry(&kept).unwrap();

        let removed = db
            .delete_audit_entries_before(now - Duration::days(90))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(db.count_audit_entries().unwrap(), 1);

        let history = db.get_audit_history(EntityType::Reward, "r1", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, kept.id);
    }

    #[test]
    fn test_entries_within_one_millisecond_keep_their_order() {
        let (db, _temp) = setup_db();
        let t0 = Utc::now() - Duration::minutes(5);

        for n in 0..20 {
            let id = format!("c{n}");
            let first = make_audit_entry(AuditAction::Create, EntityType::Chore, &id, t0);
            let second = make_audit_entry(
                AuditAction::Update,
                EntityType::Chore,
                &id,
                t0 + Duration::microseconds(300),
            );
            db.append_audit_entry(&first).unwrap();
            db.append_audit_entry(&second).unwrap();

            let history = db.get_audit_history(EntityType::Chore, &id, 10).unwrap();
            assert_eq!(history.len(), 2);
            assert_eq!(history[0].id, second.id, "entity {id}");
            assert_eq!(history[1].id, first.id, "entity {id}");
        }

        let recent = db.scan_audit_entries(None, 500, |_| true).unwrap();
        assert_eq!(recent.len(), 40);
        assert!(recent
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(recent[0].action, AuditAction::Update);
    }

    #[test]
    fn test_delete_keeps_entry_at_exact_cutoff() {
        let (db, _temp) = setup_db();
        let cutoff = Utc::now() - Duration::days(90);
        let just_before = make_audit_entry(
            AuditAction::Delete,
            EntityType::MealPlan,
            "m1",
            cutoff - Duration::microseconds(200),
        );
        let at_cutoff =
            make_audit_entry(AuditAction::Create, EntityType::MealPlan, "m1", cutoff);
        db.append_audit_entry(&just_before).unwrap();
        db.append_audit_entry(&at_cutoff).unwrap();

        assert_eq!(db.delete_audit_entries_before(cutoff).unwrap(), 1);
        let history = db.get_audit_history(EntityType::MealPlan, "m1", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, at_cutoff.id);
    }
}
