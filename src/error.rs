// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Domain error taxonomy and its HTTP mapping.
//!
//! Store-layer failures surface as [`KeyError::Store`] without leaking
//! internal store details to clients; every other variant is a domain error
//! returned directly and never retried by the engine.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum KeyError {
    /// Malformed or missing input.
    #[error("{0}")]
    BadRequest(String),

    /// Bad admin credential, or key in a non-claimable/mismatched state.
    #[error("{0}")]
    Unauthorized(String),

    /// Unknown key id.
    #[error("{0}")]
    NotFound(String),

    /// Claim race lost, or the key was already consumed by another flow.
    #[error("key already claimed")]
    AlreadyClaimed,

    /// The key is permanently bound to a different device.
    #[error("key already bound to another device")]
    HwidMismatch,

    /// Semantically invalid argument, e.g. a non-positive issuance count.
    #[error("{0}")]
    InvalidArgument(String),

    /// Underlying store unavailable or a write failed.
    #[error("store error")]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl KeyError {
    pub fn status(&self) -> StatusCode {
        match self {
            KeyError::BadRequest(_) | KeyError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            KeyError::Unauthorized(_) | KeyError::HwidMismatch => StatusCode::UNAUTHORIZED,
            KeyError::NotFound(_) => StatusCode::NOT_FOUND,
            KeyError::AlreadyClaimed => StatusCode::CONFLICT,
            KeyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for KeyError {
    fn into_response(self) -> Response {
        if let KeyError::Store(ref inner) = self {
            tracing::error!(error = %inner, "store operation failed");
        }
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}
