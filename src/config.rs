// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup into an
//! immutable [`Config`] that is injected through the application state —
//! never read ambiently after boot.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ADMIN_KEY` | Shared admin bearer secret | Required |
//! | `ALLOWED_ORIGIN` | CORS origin for browser clients | None (no CORS) |
//! | `DATA_DIR` | Directory for the key database and audit log | None (in-memory store) |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Environment variable name for the admin bearer secret.
pub const ADMIN_KEY_ENV: &str = "ADMIN_KEY";

/// Environment variable name for the allowed CORS origin.
pub const ALLOWED_ORIGIN_ENV: &str = "ALLOWED_ORIGIN";

/// Environment variable name for the data directory path.
///
/// When unset the service runs on the in-memory store and disables the
/// audit log; keys do not survive a restart.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable names for the bind address.
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{0} is not a valid value for {1}")]
    Invalid(String, &'static str),
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret authorizing issuance, listing, revocation, and stats.
    pub admin_secret: String,
    /// Origin allowed by CORS, if browser clients are expected.
    pub allowed_origin: Option<String>,
    /// Where the key database and audit log live; `None` means in-memory.
    pub data_dir: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    /// `true` when `LOG_FORMAT=json`.
    pub log_json: bool,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let admin_secret = env::var(ADMIN_KEY_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing(ADMIN_KEY_ENV))?;

        let port_raw = env::var(PORT_ENV).unwrap_or_else(|_| "8080".to_string());
        let port: u16 = port_raw
            .parse()
            .map_err(|_| ConfigError::Invalid(port_raw, PORT_ENV))?;

        Ok(Self {
            admin_secret,
            allowed_origin: env::var(ALLOWED_ORIGIN_ENV).ok().filter(|s| !s.is_empty()),
            data_dir: env::var(DATA_DIR_ENV)
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            host: env::var(HOST_ENV).unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            log_json: env::var(LOG_FORMAT_ENV)
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}
