// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded key record database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `keys`: key id → serialized KeyRecord (JSON bytes)
//!
//! redb serializes write transactions, so the check-and-write inside
//! [`KeyDatabase::conditional_update`] is atomic across concurrent claim
//! attempts: exactly one claim observes `Available` and commits, the rest
//! observe the committed post-claim state.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::models::{KeyRecord, KeyState};

use super::{
    sort_newest_first, BindOutcome, ClaimUpdate, KeyStore, StateCounts, StoreError, StoreResult,
    UpdateOutcome,
};

/// Primary table: key id → serialized KeyRecord (JSON bytes).
const KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("keys");

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        StoreError::WriteFailed(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

/// Durable key record store.
pub struct KeyDatabase {
    db: Database,
}

impl KeyDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail.
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(KEYS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn decode(bytes: &[u8]) -> StoreResult<KeyRecord> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl KeyStore for KeyDatabase {
    fn get(&self, id: &str) -> StoreResult<Option<KeyRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KEYS)?;
        match table.get(id)? {
            Some(value) => Ok(Some(Self::decode(value.value())?)),
            None => Ok(None),
        }
    }

    fn conditional_update(
        &self,
        id: &str,
        expected_state: KeyState,
        update: ClaimUpdate,
    ) -> StoreResult<UpdateOutcome> {
        let write_txn = self.db.begin_write()?;
        let outcome;
        {
            let mut table = write_txn.open_table(KEYS)?;
            // Copy the bytes out so the access guard's borrow of the table
            // ends before any abort path.
            let raw = table.get(id)?.map(|v| v.value().to_vec());
            let current = match raw {
                Some(bytes) => Self::decode(&bytes)?,
                None => {
                    drop(table);
                    write_txn.abort()?;
                    return Ok(UpdateOutcome::NotFound);
                }
            };

            if current.state != expected_state {
                drop(table);
                write_txn.abort()?;
                return Ok(UpdateOutcome::ConditionFailed(current));
            }

            if let (Some(presented), Some(existing)) =
                (update.bound_hwid.as_deref(), current.bound_hwid.as_deref())
            {
                if presented != existing {
                    drop(table);
                    write_txn.abort()?;
                    return Ok(UpdateOutcome::HwidConflict(current));
                }
            }

            let mut updated = current;
            updated.state = update.state;
            if let Some(hwid) = update.bound_hwid {
                updated.bound_hwid = Some(hwid);
            }
            if let Some(at) = update.redeemed_at {
                updated.redeemed_at = Some(at);
            }

            let json = serde_json::to_vec(&updated)?;
            table.insert(id, json.as_slice())?;
            outcome = UpdateOutcome::Updated(updated);
        }
        write_txn.commit()?;
        Ok(outcome)
    }

    fn bind_hwid_if_unset(&self, id: &str, hwid: &str) -> StoreResult<BindOutcome> {
        let write_txn = self.db.begin_write()?;
        let outcome;
        {
            let mut table = write_txn.open_table(KEYS)?;
            let raw = table.get(id)?.map(|v| v.value().to_vec());
            let current = match raw {
                Some(bytes) => Self::decode(&bytes)?,
                None => {
                    drop(table);
                    write_txn.abort()?;
                    return Ok(BindOutcome::NotFound);
                }
            };

            if current.bound_hwid.is_some() {
                drop(table);
                write_txn.abort()?;
                return Ok(BindOutcome::AlreadyBound(current));
            }

            let mut updated = current;
            updated.bound_hwid = Some(hwid.to_string());

            let json = serde_json::to_vec(&updated)?;
            table.insert(id, json.as_slice())?;
            outcome = BindOutcome::Bound(updated);
        }
        write_txn.commit()?;
        Ok(outcome)
    }

    fn insert_batch(&self, records: &[KeyRecord]) -> StoreResult<()> {
        // One write transaction: either every record commits or none do.
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KEYS)?;
            for record in records {
                if table.get(record.id.as_str())?.is_some() {
                    drop(table);
                    write_txn.abort()?;
                    return Err(StoreError::DuplicateId(record.id.clone()));
                }
                let json = serde_json::to_vec(record)?;
                table.insert(record.id.as_str(), json.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete(&self, id: &str) -> StoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed;
        {
            let mut table = write_txn.open_table(KEYS)?;
            existed = table.remove(id)?.is_some();
        }
        write_txn.commit()?;
        Ok(existed)
    }

    fn list_all(&self) -> StoreResult<Vec<KeyRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KEYS)?;

        let mut all = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            all.push(Self::decode(entry.1.value())?);
        }
        sort_newest_first(&mut all);
        Ok(all)
    }

    fn count_by_state(&self) -> StoreResult<StateCounts> {
        // One read transaction = one consistent snapshot.
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KEYS)?;

        let mut counts = StateCounts::default();
        for entry in table.iter()? {
            let entry = entry?;
            counts.bump(Self::decode(entry.1.value())?.state);
        }
        Ok(counts)
    }
}
