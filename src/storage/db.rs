use chrono::{DateTime, Utc};
use redb::{Database as RedbDatabase, ReadTransaction, WriteTransaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::tables::*;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("Deserialization error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("Serialization error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Redb(#[from] redb::Error),
    #[error("Database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
}

/// Handle to the embedded store. Cloning shares the same underlying file.
#[derive(Clone)]
pub struct Database {
    db: Arc<RedbDatabase>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("household-access.redb");
        let db = RedbDatabase::create(db_path)?;

        // Create tables if they don't exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CREDENTIAL)?;
            let _ = write_txn.open_table(SESSIONS)?;
            let _ = write_txn.open_table(SESSION_EXPIRY)?;
            let _ = write_txn.open_table(AUDIT_LOG)?;
            let _ = write_txn.open_table(AUDIT_BY_ENTITY)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }
}

/// Build a key that sorts by timestamp at full precision:
/// "{millis:020}.{sub_millisecond_nanos:06}:{suffix}".
///
/// Pre-epoch timestamps clamp to zero so the fixed width keeps lexical order.
pub fn time_key(at: &DateTime<Utc>, suffix: &str) -> String {
    let millis = at.timestamp_millis();
    let nanos = if millis < 0 {
        0
    } else {
        at.timestamp_subsec_nanos() % 1_000_000
    };
    format!("{:020}.{nanos:06}:{suffix}", millis.max(0))
}

/// Extract the millisecond timestamp from a key built by [`time_key`]
pub fn time_key_ms(key: &str) -> Option<i64> {
    let (stamp, _) = key.split_once(':')?;
    let (ms, nanos) = stamp.split_once('.')?;
    if nanos.len() != 6 || !nanos.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    ms.parse().ok()
}
