// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP binding for the key service.
//!
//! Handlers are thin adapters: they authenticate, call into the lifecycle
//! engine / admin manager / validation service / stats aggregator, and
//! translate domain errors to status codes. No business logic lives here.

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Config,
    models::{
        IssueKeysRequest, IssueKeysResponse, KeyListResponse, KeyRecord, KeyState, RevokeResponse,
        StatsResponse, ValidateRequest, ValidateResponse,
    },
    state::AppState,
};

pub mod health;
pub mod keys;
pub mod stats;
pub mod validate;

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let v1_routes = Router::new()
        .route("/keys", post(keys::issue_keys).get(keys::list_keys))
        .route("/keys/{id}", delete(keys::revoke_key))
        .route("/keys/{id}/expire", post(keys::expire_key))
        .route("/validate", post(validate::validate_key))
        .route("/stats", get(stats::get_stats));

    Router::new()
        .nest("/v1", v1_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// CORS restricted to the configured origin; disabled when none is set.
fn cors_layer(config: &Config) -> CorsLayer {
    let Some(origin) = config.allowed_origin.as_deref() else {
        return CorsLayer::new();
    };
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        Err(_) => {
            tracing::warn!(%origin, "ignoring unparsable allowed origin");
            CorsLayer::new()
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        keys::issue_keys,
        keys::list_keys,
        keys::revoke_key,
        keys::expire_key,
        validate::validate_key,
        stats::get_stats,
        health::health,
        health::liveness
    ),
    components(
        schemas(
            KeyRecord,
            KeyState,
            IssueKeysRequest,
            IssueKeysResponse,
            KeyListResponse,
            RevokeResponse,
            ValidateRequest,
            ValidateResponse,
            StatsResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Keys", description = "Admin key issuance, listing, revocation, expiry"),
        (name = "Validate", description = "Public key redemption and re-checks"),
        (name = "Stats", description = "Per-state key counts"),
        (name = "Health", description = "Probes")
    )
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "admin_token",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}
