// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for admin-authenticated requests.
//!
//! Use the `AdminAuth` extractor in handlers to require the shared admin
//! secret:
//!
//! ```rust,ignore
//! async fn list_keys(_admin: AdminAuth, State(state): State<AppState>) -> ... {
//!     // only reached with a valid Authorization: Bearer <ADMIN_KEY>
//! }
//! ```
//!
//! The presented token and the configured secret are compared through
//! fixed-length SHA-256 digests, so response timing is independent of how
//! much of the secret matches or how long it is.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use ring::digest;

use crate::error::KeyError;
use crate::state::AppState;
use crate::storage::{AuditEvent, AuditEventType};

/// Marker extractor proving the request carried the admin secret.
pub struct AdminAuth;

/// Timing-safe equality via fixed-length digests: hashing collapses both
/// inputs to 32 bytes before any comparison, so neither the secret's
/// length nor a matching prefix shows up in the timing.
fn secrets_match(token: &[u8], secret: &[u8]) -> bool {
    digest::digest(&digest::SHA256, token).as_ref()
        == digest::digest(&digest::SHA256, secret).as_ref()
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = KeyError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .unwrap_or("");

        if !secrets_match(token.as_bytes(), state.config.admin_secret.as_bytes()) {
            state
                .audit
                .record(AuditEvent::new(AuditEventType::AdminAuthFailed));
            return Err(KeyError::Unauthorized("unauthorized".into()));
        }

        Ok(AdminAuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<AdminAuth, KeyError> {
        let state = AppState::for_tests();
        let mut builder = Request::builder().uri("/v1/keys");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        AdminAuth::from_request_parts(&mut parts, &state).await
    }

    #[test]
    fn secrets_match_handles_length_differences() {
        assert!(secrets_match(b"same-secret", b"same-secret"));
        assert!(!secrets_match(b"same-secret", b"same-secret-longer"));
        assert!(!secrets_match(b"", b"same-secret"));
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        assert!(matches!(
            extract(None).await,
            Err(KeyError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn wrong_secret_is_unauthorized() {
        assert!(matches!(
            extract(Some("Bearer wrong-secret")).await,
            Err(KeyError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_unauthorized() {
        assert!(matches!(
            extract(Some("Basic dGVzdA==")).await,
            Err(KeyError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn correct_secret_passes() {
        assert!(extract(Some("Bearer test-admin-secret")).await.is_ok());
    }
}
