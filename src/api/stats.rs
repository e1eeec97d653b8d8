// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin statistics endpoint.

use axum::{extract::State, Json};

use crate::{
    auth::AdminAuth, error::KeyError, models::StatsResponse, state::AppState,
    stats::StatsAggregator,
};

#[utoipa::path(
    get,
    path = "/v1/stats",
    tag = "Stats",
    security(("admin_token" = [])),
    responses(
        (status = 200, body = StatsResponse),
        (status = 401, description = "Bad admin credential")
    )
)]
pub async fn get_stats(
    _admin: AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, KeyError> {
    let aggregator = StatsAggregator::new(state.store.as_ref());
    Ok(Json(aggregator.aggregate()?))
}
