// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;

/// Key material of the oracle. Empty strings until initialized.
#[derive(Debug, Serialize, ToSchema)]
pub struct KeyInfoResponse {
    /// Checksummed Ethereum address of the oracle key.
    pub address: String,
    /// Uncompressed secp256k1 public key (`0x04…`) requesters encrypt to.
    pub public_key: String,
    pub initialized: bool,
}

#[utoipa::path(
    get,
    path = "/keys",
    tag = "Keys",
    responses(
        (status = 200, description = "Oracle key information", body = KeyInfoResponse)
    )
)]
pub async fn keys(State(state): State<AppState>) -> Json<KeyInfoResponse> {
    let info = state.crypto.key_info();
    Json(KeyInfoResponse {
        address: info.address,
        public_key: info.public_key,
        initialized: info.initialized,
    })
}

/// Encrypt a value for use in an on-chain request.
///
/// Convenience for requesters; the plaintext travels to this endpoint, so
/// only use it over a trusted channel.
#[utoipa::path(
    get,
    path = "/encrypt/{value}",
    tag = "Keys",
    params(
        ("value" = String, Path, description = "Plaintext to encrypt")
    ),
    responses(
        (status = 200, description = "Base64 ciphertext", body = String),
        (status = 503, description = "Crypto service not initialized"),
        (status = 500, description = "Encryption failed")
    )
)]
pub async fn encrypt(
    State(state): State<AppState>,
    Path(value): Path<String>,
) -> Result<Json<String>, ApiError> {
    if !state.crypto.is_initialized() {
        return Err(ApiError::service_unavailable("Crypto service not initialized"));
    }

    let ciphertext = state.crypto.encrypt_for_chain(&value)?;
    debug!(bytes = value.len(), "Encrypted value for requester");
    Ok(Json(ciphertext))
}
