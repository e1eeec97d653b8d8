// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Stats aggregator.
//!
//! Derives per-state key counts for reporting. The counts come from a
//! single store snapshot, so `total` always equals the sum of the state
//! counts within one response.

use crate::error::KeyError;
use crate::models::StatsResponse;
use crate::storage::KeyStore;

pub struct StatsAggregator<'a> {
    store: &'a dyn KeyStore,
}

impl<'a> StatsAggregator<'a> {
    pub fn new(store: &'a dyn KeyStore) -> Self {
        Self { store }
    }

    pub fn aggregate(&self) -> Result<StatsResponse, KeyError> {
        let counts = self.store.count_by_state()?;
        Ok(StatsResponse {
            total: counts.total(),
            available: counts.available,
            active: counts.active,
            used: counts.used,
            expired: counts.expired,
        })
    }
}
