// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public key validation endpoint.
//!
//! This is the only unauthenticated mutation surface, so its responses are
//! deliberately coarse: a revoked key and a never-issued key produce the
//! same answer, and internal failures never carry store details.

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::KeyError,
    models::{ValidateRequest, ValidateResponse},
    state::AppState,
    storage::{AuditEvent, AuditEventType},
    validation::ValidationService,
};

#[utoipa::path(
    post,
    path = "/v1/validate",
    request_body = ValidateRequest,
    tag = "Validate",
    responses(
        (status = 200, description = "Key accepted", body = ValidateResponse),
        (status = 400, description = "Key not provided", body = ValidateResponse),
        (status = 401, description = "Key expired or bound to another device", body = ValidateResponse),
        (status = 404, description = "Key invalid", body = ValidateResponse)
    )
)]
pub async fn validate_key(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> (StatusCode, Json<ValidateResponse>) {
    let key = request.key.as_deref().unwrap_or("");
    let hwid = request.hwid.as_deref().filter(|h| !h.is_empty());

    let service = ValidationService::new(state.store.as_ref());
    match service.validate(key, hwid) {
        Ok(validation) => {
            if validation.claimed_now {
                tracing::info!(key_id = %key, "key claimed");
                state.audit.record(
                    AuditEvent::new(AuditEventType::KeyClaimed)
                        .key(key)
                        .details(serde_json::json!({ "hwid": hwid })),
                );
            } else if validation.bound_now {
                state.audit.record(
                    AuditEvent::new(AuditEventType::KeyHwidBound)
                        .key(key)
                        .details(serde_json::json!({ "hwid": hwid })),
                );
            }
            (StatusCode::OK, Json(ValidateResponse::ok(validation.label)))
        }
        Err(err) => denied(err),
    }
}

/// Map a domain error to the coarse wire answer.
///
/// `AlreadyClaimed` (a lost claim race) answers like a HWID conflict: by
/// the time the caller retries, the key belongs to whichever device won.
fn denied(err: KeyError) -> (StatusCode, Json<ValidateResponse>) {
    let (status, message) = match err {
        KeyError::BadRequest(_) => (StatusCode::BAD_REQUEST, "key not provided"),
        KeyError::NotFound(_) => (StatusCode::NOT_FOUND, "key invalid"),
        KeyError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "key inactive or expired"),
        KeyError::HwidMismatch | KeyError::AlreadyClaimed => (
            StatusCode::UNAUTHORIZED,
            "key already bound to another device",
        ),
        KeyError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "key not provided"),
        KeyError::Store(ref inner) => {
            tracing::error!(error = %inner, "validation hit a store failure");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    };
    (status, Json(ValidateResponse::denied(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleEngine;

    async fn run(
        state: &AppState,
        key: Option<&str>,
        hwid: Option<&str>,
    ) -> (StatusCode, ValidateResponse) {
        let (status, Json(body)) = validate_key(
            State(state.clone()),
            Json(ValidateRequest {
                key: key.map(str::to_string),
                hwid: hwid.map(str::to_string),
            }),
        )
        .await;
        (status, body)
    }

    fn issue_one(state: &AppState, label: &str) -> String {
        LifecycleEngine::new(state.store.as_ref())
            .issue_batch(label, 1)
            .unwrap()
            .remove(0)
            .id
    }

    #[tokio::test]
    async fn missing_key_is_400() {
        let state = AppState::for_tests();
        let (status, body) = run(&state, None, Some("HW1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.valid);
    }

    #[tokio::test]
    async fn unknown_key_is_404_without_mutation() {
        let state = AppState::for_tests();
        issue_one(&state, "other");

        let (status, body) = run(&state, Some("nope"), Some("HW1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.valid);
        assert!(body.label.is_none());
    }

    #[tokio::test]
    async fn available_key_claims_and_returns_label() {
        let state = AppState::for_tests();
        let id = issue_one(&state, "customer-x");

        let (status, body) = run(&state, Some(&id), Some("HW1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.valid);
        assert_eq!(body.label.as_deref(), Some("customer-x"));
    }

    #[tokio::test]
    async fn second_device_gets_401() {
        let state = AppState::for_tests();
        let id = issue_one(&state, "bound");

        run(&state, Some(&id), Some("HW1")).await;
        let (status, body) = run(&state, Some(&id), Some("HW2")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body.valid);
    }

    #[tokio::test]
    async fn same_device_revalidates_ok() {
        let state = AppState::for_tests();
        let id = issue_one(&state, "recheck");

        run(&state, Some(&id), Some("HW1")).await;
        let (status, body) = run(&state, Some(&id), Some("HW1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.valid);
        assert_eq!(body.label.as_deref(), Some("recheck"));
    }

    #[tokio::test]
    async fn expired_key_gets_401() {
        let state = AppState::for_tests();
        let id = issue_one(&state, "expired");
        LifecycleEngine::new(state.store.as_ref())
            .expire(&id)
            .unwrap();

        let (status, body) = run(&state, Some(&id), Some("HW1")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body.valid);
    }

    #[tokio::test]
    async fn revoked_key_matches_unknown_key_response() {
        let state = AppState::for_tests();
        let id = issue_one(&state, "revoked");
        LifecycleEngine::new(state.store.as_ref())
            .revoke(&id)
            .unwrap();

        let (revoked_status, revoked_body) = run(&state, Some(&id), Some("HW1")).await;
        let (unknown_status, unknown_body) = run(&state, Some("ghost"), Some("HW1")).await;
        assert_eq!(revoked_status, unknown_status);
        assert_eq!(revoked_body.message, unknown_body.message);
    }
}
