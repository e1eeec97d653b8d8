// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin key management endpoints: batch issuance, listing, revocation,
//! and administrative expiry. All require the admin bearer secret.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    auth::AdminAuth,
    error::KeyError,
    manager::AdminKeyManager,
    models::{IssueKeysRequest, IssueKeysResponse, KeyListResponse, KeyRecord, RevokeResponse},
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

#[utoipa::path(
    post,
    path = "/v1/keys",
    request_body = IssueKeysRequest,
    tag = "Keys",
    security(("admin_token" = [])),
    responses(
        (status = 200, body = IssueKeysResponse),
        (status = 400, description = "Invalid label or count"),
        (status = 401, description = "Bad admin credential")
    )
)]
pub async fn issue_keys(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Json(request): Json<IssueKeysRequest>,
) -> Result<Json<IssueKeysResponse>, KeyError> {
    let manager = AdminKeyManager::new(state.store.as_ref());
    let keys = manager.issue_batch(&request.label, request.count)?;

    tracing::info!(label = %request.label, count = keys.len(), "issued key batch");
    state.audit.record(
        AuditEvent::new(AuditEventType::KeyBatchIssued)
            .details(serde_json::json!({ "label": request.label, "count": keys.len() })),
    );

    Ok(Json(IssueKeysResponse {
        success: true,
        keys,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/keys",
    tag = "Keys",
    security(("admin_token" = [])),
    responses(
        (status = 200, body = KeyListResponse),
        (status = 401, description = "Bad admin credential")
    )
)]
pub async fn list_keys(
    _admin: AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<KeyListResponse>, KeyError> {
    let manager = AdminKeyManager::new(state.store.as_ref());
    let keys = manager.list_all()?;
    let total = keys.len();
    Ok(Json(KeyListResponse { keys, total }))
}

#[utoipa::path(
    delete,
    path = "/v1/keys/{id}",
    params(("id" = String, Path, description = "Key id to revoke")),
    tag = "Keys",
    security(("admin_token" = [])),
    responses(
        (status = 200, body = RevokeResponse),
        (status = 404, description = "Unknown key id"),
        (status = 401, description = "Bad admin credential")
    )
)]
pub async fn revoke_key(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RevokeResponse>, KeyError> {
    let manager = AdminKeyManager::new(state.store.as_ref());
    manager.revoke(&id)?;

    tracing::info!(key_id = %id, "revoked key");
    state
        .audit
        .record(AuditEvent::new(AuditEventType::KeyRevoked).key(&id));

    Ok(Json(RevokeResponse { success: true }))
}

#[utoipa::path(
    post,
    path = "/v1/keys/{id}/expire",
    params(("id" = String, Path, description = "Key id to expire")),
    tag = "Keys",
    security(("admin_token" = [])),
    responses(
        (status = 200, body = KeyRecord),
        (status = 404, description = "Unknown key id"),
        (status = 409, description = "Key already consumed"),
        (status = 401, description = "Bad admin credential")
    )
)]
pub async fn expire_key(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<KeyRecord>, KeyError> {
    let manager = AdminKeyManager::new(state.store.as_ref());
    let record = manager.expire(&id)?;

    tracing::info!(key_id = %id, "expired key");
    state
        .audit
        .record(AuditEvent::new(AuditEventType::KeyExpired).key(&id));

    Ok(Json(record))
}
