use chrono::{DateTime, Duration, Utc};
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::Credential;
use super::tables::*;

impl Database {
    // ========================================================================
    // Credential operations
    // ========================================================================

    /// Read the household credential, if one was ever set up
    pub fn get_credential(&self) -> Result<Option<Credential>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(CREDENTIAL)?;

        match table.get(CREDENTIAL_KEY)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Insert or replace the credential row
    pub fn put_credential(&self, credential: &Credential) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(CREDENTIAL)?;
            let data = rmp_serde::to_vec_named(credential)?;
            table.insert(CREDENTIAL_KEY, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Store `credential` unless a configured PIN already exists.
    ///
    /// The check and the insert share one write transaction, so of two
    /// concurrent first-time setups exactly one wins. Returns `false` when
    /// the existing PIN was left in place.
    pub fn setup_credential_if_absent(
        &self,
        credential: &Credential,
    ) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let stored = {
            let mut table = write_txn.open_table(CREDENTIAL)?;
            let existing: Option<Credential> = match table.get(CREDENTIAL_KEY)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };

            if existing.is_some_and(|existing| existing.is_configured()) {
                false
            } else {
                let data = rmp_serde::to_vec_named(credential)?;
                table.insert(CREDENTIAL_KEY, data.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(stored)
    }

    /// Count one failed verification and lock when the threshold is reached.
    ///
    /// Read and write happen inside one write transaction, so concurrent
    /// failures are serialized and no increment is lost. Returns the updated
    /// row, or `None` when no credential exists.
    pub fn record_failed_pin_attempt(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
        lockout: Duration,
    ) -> Result<Option<Credential>, DatabaseError> {
        let write_txn = self.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(CREDENTIAL)?;
            let existing: Option<Credential> = match table.get(CREDENTIAL_KEY)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };

            match existing {
                Some(mut credential) => {
                    credential.failed_attempts = credential.failed_attempts.saturating_add(1);
                    if credential.failed_attempts >= max_attempts {
                        credential.locked_until = Some(now + lockout);
                    }
                    credential.updated_at = now;
                    let data = rmp_serde::to_vec_named(&credential)?;
                    table.insert(CREDENTIAL_KEY, data.as_slice())?;
                    Some(credential)
                }
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Reset the failure counter and clear any lockout
    pub fn reset_pin_failures(&self, now: DateTime<Utc>) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(CREDENTIAL)?;
            let existing: Option<Credential> = match table.get(CREDENTIAL_KEY)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };

            if let Some(mut credential) = existing {
                if credential.failed_attempts != 0 || credential.locked_until.is_some() {
                    credential.failed_attempts = 0;
                    credential.locked_until = None;
                    credential.updated_at = now;
                    let data = rmp_serde::to_vec_named(&credential)?;
                    table.insert(CREDENTIAL_KEY, data.as_slice())?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}
