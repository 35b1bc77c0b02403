// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Control-plane HTTP surface: health, key info and an encryption helper.

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

pub mod health;
pub mod keys;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/keys", get(keys::keys))
        .route("/encrypt/{value}", get(keys::encrypt))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(health::root, health::health, keys::keys, keys::encrypt),
    components(schemas(health::HealthResponse, keys::KeyInfoResponse)),
    tags(
        (name = "Health", description = "Service status"),
        (name = "Keys", description = "Oracle encryption key")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoService;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn initialized() -> AppState {
        AppState::new(Arc::new(CryptoService::from_secret_bytes(&[8u8; 32]).unwrap()))
    }

    #[tokio::test]
    async fn health_reports_crypto_state() {
        let (status, body) = get_json(router(AppState::default()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["crypto_initialized"], false);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

        let (_, body) = get_json(router(initialized()), "/").await;
        assert_eq!(body["status"], "online");
        assert_eq!(body["crypto_initialized"], true);
    }

    #[tokio::test]
    async fn keys_are_empty_until_initialized() {
        let (status, body) = get_json(router(AppState::default()), "/keys").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["address"], "");
        assert_eq!(body["public_key"], "");
        assert_eq!(body["initialized"], false);
    }

    #[tokio::test]
    async fn keys_expose_public_material() {
        let state = initialized();
        let expected = state.crypto.key_info();
        let (_, body) = get_json(router(state), "/keys").await;

        assert_eq!(body["address"], expected.address);
        assert_eq!(body["public_key"], expected.public_key);
        assert!(body["public_key"].as_str().unwrap().starts_with("0x04"));
        assert_eq!(body["initialized"], true);
    }

    #[tokio::test]
    async fn encrypt_requires_initialized_codec() {
        let (status, body) = get_json(router(AppState::default()), "/encrypt/secret").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Crypto service not initialized");
    }

    #[tokio::test]
    async fn encrypt_returns_decryptable_ciphertext() {
        let state = initialized();
        let crypto = state.crypto.clone();
        let (status, body) = get_json(router(state), "/encrypt/api-key-123").await;

        assert_eq!(status, StatusCode::OK);
        let ciphertext = body.as_str().unwrap();
        assert_eq!(crypto.decrypt_from_chain(ciphertext).unwrap(), "api-key-123");
    }

    #[tokio::test]
    async fn docs_are_served() {
        let response = router(AppState::default())
            .oneshot(
                Request::builder()
                    .uri("/api-doc/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
