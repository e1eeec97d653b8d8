// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keyforge - License Key Issuance & Activation Service
//!
//! This crate issues opaque license keys, lets a client application
//! activate a key exactly once by binding it to a hardware identifier
//! (HWID), and gives administrators batch issuance, revocation, and
//! per-state statistics.
//!
//! ## Modules
//!
//! - `lifecycle` - the key state machine and its atomic claim transition
//! - `manager` - admin batch issuance, listing, revocation
//! - `validation` - the public redeem/re-check protocol
//! - `stats` - per-state counts
//! - `storage` - the record store (redb or in-memory) and audit sink
//! - `api` - HTTP handlers (Axum)
//! - `auth` - admin bearer-secret authentication

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod models;
pub mod state;
pub mod stats;
pub mod storage;
pub mod validation;
