// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public validation service.
//!
//! The unauthenticated redeem/re-check protocol consumed by client
//! applications:
//!
//! - an `Available` key is claimed (the one-shot consuming transition,
//!   binding the presented HWID);
//! - a claimed key with a matching or absent HWID re-validates without any
//!   state change, so clients can re-check an activated key on startup;
//! - a claimed key presented from a different device is refused.
//!
//! Exactly one of `claim` or `bind_if_unbound` runs per call; the two never
//! both mutate state in the same request.

use crate::error::KeyError;
use crate::lifecycle::LifecycleEngine;
use crate::models::{KeyRecord, KeyState};
use crate::storage::KeyStore;

/// Successful validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Owner/batch label of the key.
    pub label: String,
    /// Whether this call performed the consuming claim transition.
    pub claimed_now: bool,
    /// Whether this call recorded the key's HWID for the first time.
    pub bound_now: bool,
}

pub struct ValidationService<'a> {
    store: &'a dyn KeyStore,
    engine: LifecycleEngine<'a>,
}

impl<'a> ValidationService<'a> {
    pub fn new(store: &'a dyn KeyStore) -> Self {
        Self {
            store,
            engine: LifecycleEngine::new(store),
        }
    }

    /// Validate a presented key, claiming it if still available.
    ///
    /// Key ids are compared by exact byte equality; no trimming or case
    /// folding. Failures stay coarse on purpose — a revoked key answers
    /// exactly like one that never existed.
    pub fn validate(&self, id: &str, hwid: Option<&str>) -> Result<Validation, KeyError> {
        if id.is_empty() {
            return Err(KeyError::BadRequest("key not provided".into()));
        }

        let record = self
            .store
            .get(id)?
            .ok_or_else(|| KeyError::NotFound("key invalid".into()))?;

        match record.state {
            KeyState::Expired => Err(KeyError::Unauthorized("key inactive or expired".into())),
            KeyState::Available => {
                // The race window between the read above and this claim is
                // covered by the store's state guard: a lost race surfaces
                // as AlreadyClaimed, never as a double consumption.
                let claimed = self.engine.claim(id, hwid)?;
                Ok(Validation {
                    label: claimed.label,
                    claimed_now: true,
                    bound_now: hwid.is_some(),
                })
            }
            KeyState::Active | KeyState::Used => self.revalidate(record, hwid),
        }
    }

    /// Re-presentation of an already-claimed key: no state change, at most
    /// a first-time HWID registration.
    fn revalidate(&self, record: KeyRecord, hwid: Option<&str>) -> Result<Validation, KeyError> {
        match (&record.bound_hwid, hwid) {
            (Some(bound), Some(presented)) if bound != presented => Err(KeyError::HwidMismatch),
            (None, Some(presented)) => {
                let bound = self.engine.bind_if_unbound(&record.id, presented)?;
                Ok(Validation {
                    label: bound.label,
                    claimed_now: false,
                    bound_now: true,
                })
            }
            _ => Ok(Validation {
                label: record.label,
                claimed_now: false,
                bound_now: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryKeyStore;

    fn issued(store: &InMemoryKeyStore, label: &str) -> String {
        LifecycleEngine::new(store)
            .issue_batch(label, 1)
            .unwrap()
            .remove(0)
            .id
    }

    #[test]
    fn empty_key_is_a_bad_request() {
        let store = InMemoryKeyStore::new();
        let service = ValidationService::new(&store);
        assert!(matches!(
            service.validate("", Some("HW1")),
            Err(KeyError::BadRequest(_))
        ));
    }

    #[test]
    fn unknown_key_is_not_found_and_store_is_untouched() {
        let store = InMemoryKeyStore::new();
        issued(&store, "other");
        let service = ValidationService::new(&store);

        let before = store.list_all().unwrap();
        assert!(matches!(
            service.validate("no-such-key", Some("HW1")),
            Err(KeyError::NotFound(_))
        ));
        assert_eq!(store.list_all().unwrap(), before);
    }

    #[test]
    fn available_key_is_claimed_and_bound() {
        let store = InMemoryKeyStore::new();
        let id = issued(&store, "customer-a");
        let service = ValidationService::new(&store);

        let validation = service.validate(&id, Some("HW1")).unwrap();
        assert_eq!(validation.label, "customer-a");
        assert!(validation.claimed_now);

        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(record.state, KeyState::Used);
        assert_eq!(record.bound_hwid.as_deref(), Some("HW1"));
        assert!(record.redeemed_at.is_some());
    }

    #[test]
    fn second_device_is_refused_after_claim() {
        let store = InMemoryKeyStore::new();
        let id = issued(&store, "one-device");
        let service = ValidationService::new(&store);

        service.validate(&id, Some("HW1")).unwrap();
        assert!(matches!(
            service.validate(&id, Some("HW2")),
            Err(KeyError::HwidMismatch)
        ));

        // Binding survived the refused attempt.
        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(record.bound_hwid.as_deref(), Some("HW1"));
    }

    #[test]
    fn pre_bound_available_key_refuses_other_devices() {
        let store = InMemoryKeyStore::new();
        let id = issued(&store, "pre-bound");
        LifecycleEngine::new(&store)
            .bind_if_unbound(&id, "HW1")
            .unwrap();

        let service = ValidationService::new(&store);
        assert!(matches!(
            service.validate(&id, Some("HW2")),
            Err(KeyError::HwidMismatch)
        ));

        // Still available for the bound device.
        let validation = service.validate(&id, Some("HW1")).unwrap();
        assert!(validation.claimed_now);
        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(record.state, KeyState::Used);
        assert_eq!(record.bound_hwid.as_deref(), Some("HW1"));
    }

    #[test]
    fn same_device_revalidates_without_reclaiming() {
        let store = InMemoryKeyStore::new();
        let id = issued(&store, "recheck");
        let service = ValidationService::new(&store);

        service.validate(&id, Some("HW1")).unwrap();
        let after_claim = store.get(&id).unwrap().unwrap();

        let second = service.validate(&id, Some("HW1")).unwrap();
        assert!(!second.claimed_now);
        assert_eq!(second.label, "recheck");

        // No state change on re-presentation.
        assert_eq!(store.get(&id).unwrap().unwrap(), after_claim);
    }

    #[test]
    fn claimed_unbound_key_registers_hwid_on_representation() {
        let store = InMemoryKeyStore::new();
        let id = issued(&store, "late-bind");
        let service = ValidationService::new(&store);

        // Claim without a HWID, then re-present with one.
        service.validate(&id, None).unwrap();
        let validation = service.validate(&id, Some("HW9")).unwrap();
        assert!(!validation.claimed_now);
        assert!(validation.bound_now);

        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(record.state, KeyState::Used);
        assert_eq!(record.bound_hwid.as_deref(), Some("HW9"));

        // And the binding is now permanent.
        assert!(matches!(
            service.validate(&id, Some("HW10")),
            Err(KeyError::HwidMismatch)
        ));
    }

    #[test]
    fn hwidless_revalidation_of_bound_key_succeeds() {
        let store = InMemoryKeyStore::new();
        let id = issued(&store, "no-hwid-check");
        let service = ValidationService::new(&store);

        service.validate(&id, Some("HW1")).unwrap();
        let validation = service.validate(&id, None).unwrap();
        assert_eq!(validation.label, "no-hwid-check");
    }

    #[test]
    fn expired_key_is_unauthorized() {
        let store = InMemoryKeyStore::new();
        let id = issued(&store, "expired");
        LifecycleEngine::new(&store).expire(&id).unwrap();

        let service = ValidationService::new(&store);
        assert!(matches!(
            service.validate(&id, Some("HW1")),
            Err(KeyError::Unauthorized(_))
        ));
    }

    #[test]
    fn revoked_key_answers_like_an_unknown_one() {
        let store = InMemoryKeyStore::new();
        let id = issued(&store, "revoked");
        LifecycleEngine::new(&store).revoke(&id).unwrap();

        let service = ValidationService::new(&store);
        let revoked = service.validate(&id, Some("HW1"));
        let unknown = service.validate("never-existed", Some("HW1"));
        // No scanning oracle: both fail with the same category and message.
        match (revoked, unknown) {
            (Err(KeyError::NotFound(a)), Err(KeyError::NotFound(b))) => assert_eq!(a, b),
            other => panic!("expected NotFound for both, got {other:?}"),
        }
    }
}
