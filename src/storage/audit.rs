// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for key lifecycle and admin operations.
//!
//! The sink is fire-and-forget: append failures are logged at `warn` and
//! never fail the request that produced the event. Events are appended as
//! JSON lines under `<data_dir>/audit/events.jsonl`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    KeyBatchIssued,
    KeyClaimed,
    KeyHwidBound,
    KeyRevoked,
    KeyExpired,
    AdminAuthFailed,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Key id affected, if the event concerns a single key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    /// Additional details as JSON (batch label, count, HWID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            key_id: None,
            details: None,
        }
    }

    pub fn key(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Append-only JSONL audit sink.
///
/// `AuditSink::disabled()` produces a no-op sink for deployments without a
/// data directory.
pub struct AuditSink {
    path: Option<PathBuf>,
}

impl AuditSink {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: Some(data_dir.join("audit").join("events.jsonl")),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Record an event. Never fails the caller.
    pub fn record(&self, event: AuditEvent) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = self.append(path, &event) {
            tracing::warn!(error = %e, event_type = ?event.event_type, "audit append failed");
        }
    }

    fn append(&self, path: &Path, event: &AuditEvent) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")
    }
}
