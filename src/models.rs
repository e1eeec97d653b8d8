// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the key record entity plus the request and response
//! structures used by the REST API. All types derive `Serialize`,
//! `Deserialize`, and `ToSchema` for automatic JSON handling and OpenAPI
//! documentation.
//!
//! ## Model Categories
//!
//! - **KeyRecord / KeyState**: the license key entity and its lifecycle state
//! - **Admin requests**: batch issuance
//! - **Validation**: the public redeem/re-check contract
//! - **Stats**: per-state counts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Key Lifecycle State
// =============================================================================

/// Lifecycle state of a license key.
///
/// The canonical claimed state is [`KeyState::Used`]: a successful claim
/// moves a key from `Available` directly to `Used`. `Active` is retained as
/// a representable state (administratively assigned or imported data) and is
/// treated the same as `Used` by the validation re-presentation path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    /// Freshly issued, unbound, unclaimed. The only claimable state.
    Available,
    /// Claimed and currently valid for use.
    Active,
    /// Terminal claimed state; re-presentations validate, claims fail.
    Used,
    /// Terminal; no further transitions, all claims fail.
    Expired,
}

// =============================================================================
// Key Record
// =============================================================================

/// A license key record.
///
/// The record store is the sole persistence owner; the lifecycle engine
/// re-reads and conditionally writes on every operation and holds no
/// authoritative in-memory copy between requests.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct KeyRecord {
    /// Opaque unique token, generated from OS randomness at issuance.
    pub id: String,
    /// Free-form owner/batch name, assigned at issuance, immutable.
    pub label: String,
    /// Current lifecycle state.
    pub state: KeyState,
    /// Device identifier the key is bound to, set at most once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound_hwid: Option<String>,
    /// When the key was issued.
    pub created_at: DateTime<Utc>,
    /// When the key was successfully claimed, if it has been.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    /// Build a fresh `Available` record with a new unguessable id.
    ///
    /// `Uuid::new_v4` draws from the operating system's CSPRNG, so ids are
    /// globally unique and not enumerable.
    pub fn issue(label: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.into(),
            state: KeyState::Available,
            bound_hwid: None,
            created_at: Utc::now(),
            redeemed_at: None,
        }
    }
}

// =============================================================================
// Admin Requests / Responses
// =============================================================================

/// Request to issue a batch of keys.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssueKeysRequest {
    /// Owner/batch name shared by every key in the batch.
    pub label: String,
    /// Number of keys to issue. Must be positive.
    pub count: u32,
}

/// Response for batch issuance.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssueKeysResponse {
    pub success: bool,
    /// Newly issued key ids, in issuance order.
    pub keys: Vec<String>,
}

/// Response for key listing (admin view), newest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KeyListResponse {
    pub keys: Vec<KeyRecord>,
    pub total: usize,
}

/// Response for revocation and expiry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RevokeResponse {
    pub success: bool,
}

// =============================================================================
// Validation
// =============================================================================

/// Request body for the public validation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidateRequest {
    /// The license key id presented by the client.
    pub key: Option<String>,
    /// Hardware identifier of the presenting device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hwid: Option<String>,
}

/// Response body for the public validation endpoint.
///
/// Failure responses never say why a key is invalid beyond the coarse
/// status code; in particular a revoked key is indistinguishable from one
/// that never existed, so the endpoint cannot be used as a scanning oracle.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidateResponse {
    pub valid: bool,
    /// Owner/batch label, present on success only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidateResponse {
    pub fn ok(label: impl Into<String>) -> Self {
        Self {
            valid: true,
            label: Some(label.into()),
            message: Some("key valid".to_string()),
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            label: None,
            message: Some(message.into()),
        }
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Per-state key counts.
///
/// Computed from a single consistent read pass; `total` always equals the
/// sum of the four state counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StatsResponse {
    pub total: usize,
    pub available: usize,
    pub active: usize,
    pub used: usize,
    pub expired: usize,
}
