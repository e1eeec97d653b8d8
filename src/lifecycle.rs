// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key lifecycle engine.
//!
//! Owns the state machine and every transition on it:
//!
//! ```text
//!            issue            claim
//!   ∅ ────────────▶ Available ──────▶ Used
//!                       │                │
//!                       │ expire         │ (terminal; re-presentations
//!                       ▼                │  validate, claims fail)
//!                    Expired ◀───────────┘ expire(Active) only
//! ```
//!
//! `Active` is a representable claimed state treated like `Used` by
//! re-presentation and expiry; `claim` itself always produces `Used`.
//!
//! The engine holds no state of its own: every operation re-reads and
//! conditionally writes through the [`KeyStore`], whose state-guarded
//! update is what makes `claim` exactly-once under concurrent redemption.

use chrono::Utc;

use crate::error::KeyError;
use crate::models::{KeyRecord, KeyState};
use crate::storage::{BindOutcome, ClaimUpdate, KeyStore, UpdateOutcome};

/// Upper bound on a single issuance batch.
pub const MAX_BATCH_SIZE: u32 = 10_000;

/// Stateless facade over the record store; construct one per request.
pub struct LifecycleEngine<'a> {
    store: &'a dyn KeyStore,
}

impl<'a> LifecycleEngine<'a> {
    pub fn new(store: &'a dyn KeyStore) -> Self {
        Self { store }
    }

    /// Issue `count` fresh `Available` records sharing `label`.
    ///
    /// All-or-nothing: the records land in one batch insert, so a store
    /// failure issues nothing rather than a short batch.
    pub fn issue_batch(&self, label: &str, count: u32) -> Result<Vec<KeyRecord>, KeyError> {
        if label.trim().is_empty() {
            return Err(KeyError::InvalidArgument("label must not be empty".into()));
        }
        if count == 0 {
            return Err(KeyError::InvalidArgument("count must be positive".into()));
        }
        if count > MAX_BATCH_SIZE {
            return Err(KeyError::InvalidArgument(format!(
                "count must not exceed {MAX_BATCH_SIZE}"
            )));
        }

        let records: Vec<KeyRecord> = (0..count).map(|_| KeyRecord::issue(label)).collect();
        self.store.insert_batch(&records)?;
        Ok(records)
    }

    /// The consuming transition: `Available → Used`, exactly once.
    ///
    /// Implemented as a single state-guarded store update, so of N
    /// concurrent claims for the same id exactly one succeeds and the rest
    /// observe [`KeyError::AlreadyClaimed`]. A key pre-bound through
    /// [`Self::bind_if_unbound`] can only be claimed from its bound
    /// device: the store refuses the write on a differing HWID.
    pub fn claim(&self, id: &str, hwid: Option<&str>) -> Result<KeyRecord, KeyError> {
        let update = ClaimUpdate {
            state: KeyState::Used,
            bound_hwid: hwid.map(str::to_string),
            redeemed_at: Some(Utc::now()),
        };
        match self.store.conditional_update(id, KeyState::Available, update)? {
            UpdateOutcome::Updated(record) => Ok(record),
            UpdateOutcome::ConditionFailed(_) => Err(KeyError::AlreadyClaimed),
            UpdateOutcome::HwidConflict(_) => Err(KeyError::HwidMismatch),
            UpdateOutcome::NotFound => Err(KeyError::NotFound("key invalid".into())),
        }
    }

    /// Non-consuming HWID registration for re-presented keys.
    ///
    /// Binds the HWID if the record has none; succeeds as a no-op when the
    /// recorded HWID matches; fails [`KeyError::HwidMismatch`] otherwise.
    /// Never touches `state`.
    pub fn bind_if_unbound(&self, id: &str, hwid: &str) -> Result<KeyRecord, KeyError> {
        match self.store.bind_hwid_if_unset(id, hwid)? {
            BindOutcome::Bound(record) => Ok(record),
            BindOutcome::AlreadyBound(record) => {
                if record.bound_hwid.as_deref() == Some(hwid) {
                    Ok(record)
                } else {
                    Err(KeyError::HwidMismatch)
                }
            }
            BindOutcome::NotFound => Err(KeyError::NotFound("key invalid".into())),
        }
    }

    /// Hard-delete a record in any state.
    pub fn revoke(&self, id: &str) -> Result<(), KeyError> {
        if self.store.delete(id)? {
            Ok(())
        } else {
            Err(KeyError::NotFound("key not found".into()))
        }
    }

    /// Administrative expiry: `Available | Active → Expired`.
    ///
    /// Idempotent on an already-`Expired` record; fails
    /// [`KeyError::AlreadyClaimed`] on `Used`, which is terminal.
    pub fn expire(&self, id: &str) -> Result<KeyRecord, KeyError> {
        let update = ClaimUpdate {
            state: KeyState::Expired,
            bound_hwid: None,
            redeemed_at: None,
        };

        let mut guard = KeyState::Available;
        loop {
            match self
                .store
                .conditional_update(id, guard, update.clone())?
            {
                UpdateOutcome::Updated(record) => return Ok(record),
                // Expiry carries no HWID, so a conflict cannot arise here.
                UpdateOutcome::HwidConflict(_) => return Err(KeyError::HwidMismatch),
                UpdateOutcome::NotFound => {
                    return Err(KeyError::NotFound("key not found".into()))
                }
                UpdateOutcome::ConditionFailed(current) => match current.state {
                    KeyState::Expired => return Ok(current),
                    KeyState::Used => return Err(KeyError::AlreadyClaimed),
                    KeyState::Active if guard != KeyState::Active => {
                        guard = KeyState::Active;
                    }
                    // A concurrent claim moved Available → Used between our
                    // attempts; re-evaluate from the committed state.
                    KeyState::Available if guard != KeyState::Available => {
                        guard = KeyState::Available;
                    }
                    _ => return Err(KeyError::AlreadyClaimed),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryKeyStore;
    use std::sync::Arc;

    fn engine_store() -> InMemoryKeyStore {
        InMemoryKeyStore::new()
    }

    #[test]
    fn issue_batch_validates_arguments() {
        let store = engine_store();
        let engine = LifecycleEngine::new(&store);

        assert!(matches!(
            engine.issue_batch("batch", 0),
            Err(KeyError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.issue_batch("", 3),
            Err(KeyError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.issue_batch("batch", MAX_BATCH_SIZE + 1),
            Err(KeyError::InvalidArgument(_))
        ));
    }

    #[test]
    fn issue_batch_produces_distinct_available_records() {
        let store = engine_store();
        let engine = LifecycleEngine::new(&store);

        let records = engine.issue_batch("batch-a", 5).unwrap();
        assert_eq!(records.len(), 5);

        let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);

        for record in &records {
            assert_eq!(record.state, KeyState::Available);
            assert_eq!(record.label, "batch-a");
        }
        assert_eq!(store.list_all().unwrap().len(), 5);
    }

    #[test]
    fn claim_consumes_exactly_once() {
        let store = engine_store();
        let engine = LifecycleEngine::new(&store);
        let id = engine.issue_batch("claim", 1).unwrap()[0].id.clone();

        let claimed = engine.claim(&id, Some("HW1")).unwrap();
        assert_eq!(claimed.state, KeyState::Used);
        assert_eq!(claimed.bound_hwid.as_deref(), Some("HW1"));
        assert!(claimed.redeemed_at.is_some());

        assert!(matches!(
            engine.claim(&id, Some("HW2")),
            Err(KeyError::AlreadyClaimed)
        ));
        // The losing claim must not have rebound the key.
        let current = store.get(&id).unwrap().unwrap();
        assert_eq!(current.bound_hwid.as_deref(), Some("HW1"));
    }

    #[test]
    fn claim_unknown_key_is_not_found() {
        let store = engine_store();
        let engine = LifecycleEngine::new(&store);
        assert!(matches!(
            engine.claim("no-such-key", None),
            Err(KeyError::NotFound(_))
        ));
    }

    #[test]
    fn claim_without_hwid_leaves_key_unbound() {
        let store = engine_store();
        let engine = LifecycleEngine::new(&store);
        let id = engine.issue_batch("anon", 1).unwrap()[0].id.clone();

        let claimed = engine.claim(&id, None).unwrap();
        assert_eq!(claimed.state, KeyState::Used);
        assert!(claimed.bound_hwid.is_none());
    }

    #[test]
    fn bind_if_unbound_is_write_once_and_idempotent() {
        let store = engine_store();
        let engine = LifecycleEngine::new(&store);
        let id = engine.issue_batch("bind", 1).unwrap()[0].id.clone();

        let bound = engine.bind_if_unbound(&id, "HW1").unwrap();
        assert_eq!(bound.bound_hwid.as_deref(), Some("HW1"));
        // State is untouched by the side transition.
        assert_eq!(bound.state, KeyState::Available);

        // Same HWID: no-op success.
        let again = engine.bind_if_unbound(&id, "HW1").unwrap();
        assert_eq!(again.bound_hwid.as_deref(), Some("HW1"));

        // Different HWID: permanent binding, never overwritten.
        assert!(matches!(
            engine.bind_if_unbound(&id, "HW2"),
            Err(KeyError::HwidMismatch)
        ));
        let current = store.get(&id).unwrap().unwrap();
        assert_eq!(current.bound_hwid.as_deref(), Some("HW1"));
    }

    #[test]
    fn claim_from_another_device_cannot_rebind_a_pre_bound_key() {
        let store = engine_store();
        let engine = LifecycleEngine::new(&store);
        let id = engine.issue_batch("pre-bound", 1).unwrap()[0].id.clone();

        // HWID registered while the key is still Available.
        engine.bind_if_unbound(&id, "HW1").unwrap();

        assert!(matches!(
            engine.claim(&id, Some("HW2")),
            Err(KeyError::HwidMismatch)
        ));

        // The refused claim consumed nothing and rebound nothing.
        let current = store.get(&id).unwrap().unwrap();
        assert_eq!(current.state, KeyState::Available);
        assert_eq!(current.bound_hwid.as_deref(), Some("HW1"));

        // The bound device can still claim, as can a HWID-less claim.
        let claimed = engine.claim(&id, Some("HW1")).unwrap();
        assert_eq!(claimed.state, KeyState::Used);
        assert_eq!(claimed.bound_hwid.as_deref(), Some("HW1"));
    }

    #[test]
    fn revoke_removes_record_in_any_state() {
        let store = engine_store();
        let engine = LifecycleEngine::new(&store);
        let ids: Vec<String> = engine
            .issue_batch("revoke", 2)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();

        engine.claim(&ids[0], Some("HW1")).unwrap();
        engine.revoke(&ids[0]).unwrap();
        engine.revoke(&ids[1]).unwrap();

        assert!(matches!(
            engine.revoke(&ids[0]),
            Err(KeyError::NotFound(_))
        ));
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn expire_is_idempotent_and_refuses_used() {
        let store = engine_store();
        let engine = LifecycleEngine::new(&store);
        let ids: Vec<String> = engine
            .issue_batch("expire", 2)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();

        let expired = engine.expire(&ids[0]).unwrap();
        assert_eq!(expired.state, KeyState::Expired);
        // Expiring twice is fine.
        let again = engine.expire(&ids[0]).unwrap();
        assert_eq!(again.state, KeyState::Expired);

        // A claimed key cannot be expired.
        engine.claim(&ids[1], None).unwrap();
        assert!(matches!(engine.expire(&ids[1]), Err(KeyError::AlreadyClaimed)));

        // Expired keys are not claimable.
        assert!(matches!(
            engine.claim(&ids[0], Some("HW1")),
            Err(KeyError::AlreadyClaimed)
        ));
    }

    #[test]
    fn expire_handles_active_records() {
        let store = engine_store();
        let engine = LifecycleEngine::new(&store);
        let id = engine.issue_batch("active", 1).unwrap()[0].id.clone();

        // Move the record to Active administratively.
        store
            .conditional_update(
                &id,
                KeyState::Available,
                ClaimUpdate {
                    state: KeyState::Active,
                    bound_hwid: Some("HW1".into()),
                    redeemed_at: Some(Utc::now()),
                },
            )
            .unwrap();

        let expired = engine.expire(&id).unwrap();
        assert_eq!(expired.state, KeyState::Expired);
    }

    #[test]
    fn concurrent_claims_have_a_single_winner() {
        let store = Arc::new(engine_store());
        {
            let engine = LifecycleEngine::new(store.as_ref());
            engine.issue_batch("race", 1).unwrap();
        }
        let id = store.list_all().unwrap()[0].id.clone();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let id = id.clone();
            handles.push(std::thread::spawn(move || {
                let engine = LifecycleEngine::new(store.as_ref());
                engine.claim(&id, Some(&format!("HW{i}")))
            }));
        }

        let results: Vec<Result<KeyRecord, KeyError>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let losses = results
            .iter()
            .filter(|r| matches!(r, Err(KeyError::AlreadyClaimed)))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(losses, 15);

        // The record carries exactly the winner's HWID.
        let record = store.get(&id).unwrap().unwrap();
        let winner = results.into_iter().find_map(Result::ok).unwrap();
        assert_eq!(record.bound_hwid, winner.bound_hwid);
        assert_eq!(record.state, KeyState::Used);
    }
}
