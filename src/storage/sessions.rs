use chrono::{DateTime, Utc};
use redb::{ReadableTable, ReadableTableMetadata};

use super::db::{time_key, time_key_ms, Database, DatabaseError};
use super::models::Session;
use super::tables::*;

impl Database {
    // ========================================================================
    // Session operations
    // ========================================================================

    /// Store a session
    pub fn put_session(&self, session: &Session) -> Result<(), DatabaseError> {
        debug_assert!(!session.token.is_empty(), "session token must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            let data = rmp_serde::to_vec_named(session)?;
            table.insert(session.token.as_str(), data.as_slice())?;

            let mut expiry_table = write_txn.open_table(SESSION_EXPIRY)?;
            let ek = time_key(&session.expires_at, &session.token);
            expiry_table.insert(ek.as_str(), session.token.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a session by its secret token value
    pub fn get_session(&self, token: &str) -> Result<Option<Session>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;

        match table.get(token)? {
            Some(data) => {
                let session: Session = rmp_serde::from_slice(data.value())?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Delete a session by its secret token value
    pub fn delete_session(&self, token: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let session: Option<Session> = {
            let table = write_txn.open_table(SESSIONS)?;
            let result = table.get(token)?;
            match result {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            }
        };

        let deleted = match session {
            Some(session) => {
                {
                    let mut table = write_txn.open_table(SESSIONS)?;
                    table.remove(token)?;
                }
                {
                    let mut expiry_table = write_txn.open_table(SESSION_EXPIRY)?;
                    let ek = time_key(&session.expires_at, token);
                    expiry_table.remove(ek.as_str())?;
                }
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }

    /// Delete sessions with `expires_at <= now` using the expiration index
    /// (no full table scan).
    pub fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let now_ms = now.timestamp_millis();

        // Phase 1: read the expiration index to collect expired entries
        let expired: Vec<(String, String)> = {
            let read_txn = self.begin_read()?;
            let table = read_txn.open_table(SESSION_EXPIRY)?;
            let mut result = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let key_str = key.value().to_string();
                match time_key_ms(&key_str) {
                    Some(ms) if ms <= now_ms => {
                        result.push((key_str, value.value().to_string()));
                    }
                    _ => break,
                }
            }
            result
        };

        if expired.is_empty() {
            return Ok(0);
        }

        // Phase 2: delete the sessions and their index entries
        let write_txn = self.begin_write()?;
        let mut removed = 0;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            let mut expiry_table = write_txn.open_table(SESSION_EXPIRY)?;
            for (expiry_key_val, token) in &expired {
                let session: Option<Session> = match table.get(token.as_str())? {
                    Some(data) => Some(rmp_serde::from_slice(data.value())?),
                    None => None,
                };
                match session {
                    // Same millisecond as `now` but not yet expired
                    Some(s) if !s.is_expired_at(now) => continue,
                    Some(_) => {
                        table.remove(token.as_str())?;
                        removed += 1;
                    }
                    None => {}
                }
                expiry_table.remove(expiry_key_val.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(removed)
    }

    /// Delete every session. Returns how many were removed.
    pub fn delete_all_sessions(&self) -> Result<usize, DatabaseError> {
        let write_txn = self.begin_write()?;
        let mut removed = 0;
        {
            let table = write_txn.open_table(SESSIONS)?;
            let tokens: Vec<String> = table
                .iter()?
                .map(|r| r.map(|(k, _)| k.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            drop(table);

            let mut table = write_txn.open_table(SESSIONS)?;
            for token in tokens {
                table.remove(token.as_str())?;
                removed += 1;
            }

            let expiry_table = write_txn.open_table(SESSION_EXPIRY)?;
            let keys: Vec<String> = expiry_table
                .iter()?
                .map(|r| r.map(|(k, _)| k.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            drop(expiry_table);

            let mut expiry_table = write_txn.open_table(SESSION_EXPIRY)?;
            for key in keys {
                expiry_table.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(removed)
    }

    /// Number of stored sessions, expired or not
    pub fn count_sessions(&self) -> Result<u64, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;
        Ok(table.len()?)
    }
}
