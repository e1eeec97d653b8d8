// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Record Storage
//!
//! The record store is the single source of truth and the sole
//! synchronization point for the lifecycle engine: the exactly-once claim
//! guarantee lives here, in [`KeyStore::conditional_update`], not in any
//! in-process lock above it.
//!
//! ## Implementations
//!
//! - [`KeyDatabase`]: embedded redb database (pure Rust, ACID). Conditional
//!   operations run their check and write inside one serialized write
//!   transaction.
//! - [`InMemoryKeyStore`]: `Mutex<HashMap>` used when no data directory is
//!   configured, and by unit tests. Conditional operations check and write
//!   under a single lock guard.

pub mod audit;
pub mod keydb;
pub mod memory;

pub use audit::{AuditEvent, AuditEventType, AuditSink};
pub use keydb::KeyDatabase;
pub use memory::InMemoryKeyStore;

use thiserror::Error;

use crate::models::{KeyRecord, KeyState};

/// Store-layer failure, surfaced to callers as a coarse `StoreError`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("duplicate key id: {0}")]
    DuplicateId(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Fields written by the consuming claim transition.
///
/// `bound_hwid = None` leaves any existing binding untouched (a claim
/// without a presented HWID does not clear one).
#[derive(Debug, Clone)]
pub struct ClaimUpdate {
    pub state: KeyState,
    pub bound_hwid: Option<String>,
    pub redeemed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Outcome of a state-guarded conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The guard matched; the returned record reflects the new fields.
    Updated(KeyRecord),
    /// The record exists but its state did not match the guard.
    ConditionFailed(KeyRecord),
    /// The state guard matched, but the update carried a HWID differing
    /// from the one already recorded. Bindings are permanent, so the
    /// write is refused.
    HwidConflict(KeyRecord),
    /// No record with the given id.
    NotFound,
}

/// Outcome of a bind-if-unset HWID write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// The HWID was unset and has been recorded.
    Bound(KeyRecord),
    /// A HWID was already recorded; the caller decides whether it matches.
    AlreadyBound(KeyRecord),
    /// No record with the given id.
    NotFound,
}

/// Per-state record counts from one consistent read pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub available: usize,
    pub active: usize,
    pub used: usize,
    pub expired: usize,
}

impl StateCounts {
    pub fn total(&self) -> usize {
        self.available + self.active + self.used + self.expired
    }

    pub fn bump(&mut self, state: KeyState) {
        match state {
            KeyState::Available => self.available += 1,
            KeyState::Active => self.active += 1,
            KeyState::Used => self.used += 1,
            KeyState::Expired => self.expired += 1,
        }
    }
}

/// Abstract key record store consumed by the lifecycle engine.
///
/// Contract: per-record read-your-writes consistency, and
/// `conditional_update`/`bind_hwid_if_unset` must be atomic with respect to
/// each other and to themselves — under concurrent calls for the same id,
/// the guard is evaluated against the committed state, never a stale read.
pub trait KeyStore: Send + Sync {
    /// Fetch a record by exact id.
    fn get(&self, id: &str) -> StoreResult<Option<KeyRecord>>;

    /// Apply `update` to the record iff its current state equals
    /// `expected_state`. This is the primitive behind the exactly-once
    /// claim: "set state where state = Available and id = X".
    ///
    /// When `update.bound_hwid` is set and the record already carries a
    /// different HWID, the write is refused with
    /// [`UpdateOutcome::HwidConflict`] — an existing binding is never
    /// overwritten, not even by the consuming transition.
    fn conditional_update(
        &self,
        id: &str,
        expected_state: KeyState,
        update: ClaimUpdate,
    ) -> StoreResult<UpdateOutcome>;

    /// Record `hwid` iff the record has no HWID yet. Does not touch state.
    fn bind_hwid_if_unset(&self, id: &str, hwid: &str) -> StoreResult<BindOutcome>;

    /// Insert every record or none. Fails with [`StoreError::DuplicateId`]
    /// if any id already exists; no partial batches.
    fn insert_batch(&self, records: &[KeyRecord]) -> StoreResult<()>;

    /// Hard-delete a record. Returns whether it existed.
    fn delete(&self, id: &str) -> StoreResult<bool>;

    /// Every record, ordered by `created_at` descending, ties broken by id
    /// descending so the ordering is fully deterministic.
    fn list_all(&self) -> StoreResult<Vec<KeyRecord>>;

    /// Per-state counts from a single snapshot.
    fn count_by_state(&self) -> StoreResult<StateCounts>;
}

/// Newest-first ordering used by `list_all` implementations.
pub(crate) fn sort_newest_first(records: &mut [KeyRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
