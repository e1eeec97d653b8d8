// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::Config;
use crate::storage::{AuditSink, KeyStore};

#[cfg(test)]
use crate::storage::InMemoryKeyStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KeyStore>,
    pub config: Arc<Config>,
    pub audit: Arc<AuditSink>,
}

impl AppState {
    pub fn new(store: Arc<dyn KeyStore>, config: Config, audit: AuditSink) -> Self {
        Self {
            store,
            config: Arc::new(config),
            audit: Arc::new(audit),
        }
    }

    /// In-memory state with a fixed admin secret, for tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::new(
            Arc::new(InMemoryKeyStore::new()),
            Config {
                admin_secret: "test-admin-secret".into(),
                allowed_origin: None,
                data_dir: None,
                host: "127.0.0.1".into(),
                port: 0,
                log_json: false,
            },
            AuditSink::disabled(),
        )
    }
}
