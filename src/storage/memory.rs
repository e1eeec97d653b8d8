// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory key store.
//!
//! Used when no `DATA_DIR` is configured (local development) and by unit
//! tests. Conditional operations evaluate their guard and write under a
//! single lock guard, which gives the same exactly-once claim semantics as
//! the embedded database within one process.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{KeyRecord, KeyState};

use super::{
    sort_newest_first, BindOutcome, ClaimUpdate, KeyStore, StateCounts, StoreError, StoreResult,
    UpdateOutcome,
};

#[derive(Default)]
pub struct InMemoryKeyStore {
    records: Mutex<HashMap<String, KeyRecord>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<String, KeyRecord>>> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }
}

impl KeyStore for InMemoryKeyStore {
    fn get(&self, id: &str) -> StoreResult<Option<KeyRecord>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn conditional_update(
        &self,
        id: &str,
        expected_state: KeyState,
        update: ClaimUpdate,
    ) -> StoreResult<UpdateOutcome> {
        let mut records = self.lock()?;
        let Some(record) = records.get_mut(id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        if record.state != expected_state {
            return Ok(UpdateOutcome::ConditionFailed(record.clone()));
        }

        if let (Some(presented), Some(existing)) =
            (update.bound_hwid.as_deref(), record.bound_hwid.as_deref())
        {
            if presented != existing {
                return Ok(UpdateOutcome::HwidConflict(record.clone()));
            }
        }

        record.state = update.state;
        if let Some(hwid) = update.bound_hwid {
            record.bound_hwid = Some(hwid);
        }
        if let Some(at) = update.redeemed_at {
            record.redeemed_at = Some(at);
        }
        Ok(UpdateOutcome::Updated(record.clone()))
    }

    fn bind_hwid_if_unset(&self, id: &str, hwid: &str) -> StoreResult<BindOutcome> {
        let mut records = self.lock()?;
        let Some(record) = records.get_mut(id) else {
            return Ok(BindOutcome::NotFound);
        };

        if record.bound_hwid.is_some() {
            return Ok(BindOutcome::AlreadyBound(record.clone()));
        }

        record.bound_hwid = Some(hwid.to_string());
        Ok(BindOutcome::Bound(record.clone()))
    }

    fn insert_batch(&self, batch: &[KeyRecord]) -> StoreResult<()> {
        let mut records = self.lock()?;
        // All-or-nothing: check every id before touching the map.
        for record in batch {
            if records.contains_key(&record.id) {
                return Err(StoreError::DuplicateId(record.id.clone()));
            }
        }
        for record in batch {
            records.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.lock()?.remove(id).is_some())
    }

    fn list_all(&self) -> StoreResult<Vec<KeyRecord>> {
        let mut all: Vec<KeyRecord> = self.lock()?.values().cloned().collect();
        sort_newest_first(&mut all);
        Ok(all)
    }

    fn count_by_state(&self) -> StoreResult<StateCounts> {
        let records = self.lock()?;
        let mut counts = StateCounts::default();
        for record in records.values() {
            counts.bump(record.state);
        }
        Ok(counts)
    }
}
