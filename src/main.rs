// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use keyforge::api::router;
use keyforge::config::Config;
use keyforge::state::AppState;
use keyforge::storage::{AuditSink, InMemoryKeyStore, KeyDatabase, KeyStore};

#[tokio::main]
async fn main() {
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("configuration error: {e}");
        std::process::exit(1);
    });

    init_tracing(&config);

    let (store, audit): (Arc<dyn KeyStore>, AuditSink) = match &config.data_dir {
        Some(dir) => {
            let db = KeyDatabase::open(&dir.join("keys.redb")).unwrap_or_else(|e| {
                tracing::error!(error = %e, "failed to open key database");
                std::process::exit(1);
            });
            tracing::info!(data_dir = %dir.display(), "using embedded key database");
            (Arc::new(db), AuditSink::new(dir))
        }
        None => {
            tracing::warn!("no DATA_DIR configured; keys will not survive a restart");
            (Arc::new(InMemoryKeyStore::new()), AuditSink::disabled())
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to parse bind address");
            std::process::exit(1);
        });

    let state = AppState::new(store, config, audit);
    let app = router(state);

    tracing::info!(%addr, "keyforge listening (docs at /docs)");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl-c");
    tracing::info!("shutdown signal received");
}
