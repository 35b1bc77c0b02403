// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Service status.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `"online"` on `/`, `"ok"` on `/health`.
    pub status: String,
    /// Whether the confidential field codec holds a key.
    pub crypto_initialized: bool,
    pub version: String,
}

fn status(state: &AppState, status: &str) -> HealthResponse {
    HealthResponse {
        status: status.to_string(),
        crypto_initialized: state.crypto.is_initialized(),
        version: state.version.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn root(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(status(&state, "online"))
}

/// Liveness check. Always 200 while the process runs.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(status(&state, "ok"))
}
