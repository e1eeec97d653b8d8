// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin key manager.
//!
//! Batch issuance, listing, revocation, and administrative expiry. All
//! state transitions go through the [`LifecycleEngine`]; this layer adds
//! nothing but the admin-facing surface.

use crate::error::KeyError;
use crate::lifecycle::LifecycleEngine;
use crate::models::KeyRecord;
use crate::storage::KeyStore;

pub struct AdminKeyManager<'a> {
    store: &'a dyn KeyStore,
    engine: LifecycleEngine<'a>,
}

impl<'a> AdminKeyManager<'a> {
    pub fn new(store: &'a dyn KeyStore) -> Self {
        Self {
            store,
            engine: LifecycleEngine::new(store),
        }
    }

    /// Issue `count` keys under `label`, returning the new ids in issuance
    /// order.
    pub fn issue_batch(&self, label: &str, count: u32) -> Result<Vec<String>, KeyError> {
        let records = self.engine.issue_batch(label, count)?;
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    /// Every record, newest first. Clients rely on this ordering for
    /// display, so it is part of the contract.
    pub fn list_all(&self) -> Result<Vec<KeyRecord>, KeyError> {
        Ok(self.store.list_all()?)
    }

    /// Hard-delete a key in any state.
    pub fn revoke(&self, id: &str) -> Result<(), KeyError> {
        self.engine.revoke(id)
    }

    /// Administrative expiry, idempotent on already-expired keys.
    pub fn expire(&self, id: &str) -> Result<KeyRecord, KeyError> {
        self.engine.expire(id)
    }
}
