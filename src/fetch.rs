// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound REST client for oracle requests.
//!
//! Confidential request fields are decrypted in memory right before the call
//! and never logged. Transport problems, timeouts and error statuses are not
//! errors at this layer: they become an unsuccessful [`ApiResponse`] so the
//! requester still receives an answer on-chain. Only a decryption failure
//! aborts the request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::crypto::{CryptoError, CryptoService};
use crate::models::{ApiResponse, HttpMethod, KeyValue, RequestData};

/// Per-call timeout used when none is configured.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Failures of a single outbound call.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request timed out after {0} seconds")]
    Timeout(f64),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Error processing response: {0}")]
    Body(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// HTTP client for the external APIs named in oracle requests.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    crypto: Arc<CryptoService>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(crypto: Arc<CryptoService>, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            http,
            crypto,
            timeout,
        })
    }

    /// Copy of `request` with every encrypted field replaced by its
    /// plaintext and its flag cleared.
    ///
    /// Condition values are left untouched; they are decrypted when the
    /// condition is evaluated.
    pub fn resolve_confidential_fields(
        &self,
        request: &RequestData,
    ) -> Result<RequestData, CryptoError> {
        let mut resolved = request.clone();

        if resolved.url_encrypted {
            resolved.url = self.crypto.decrypt_from_chain(&resolved.url)?;
            resolved.url_encrypted = false;
        }
        if resolved.body_encrypted {
            resolved.body = self.crypto.decrypt_from_chain(&resolved.body)?;
            resolved.body_encrypted = false;
        }
        resolved.headers = self.resolve_pairs(&resolved.headers)?;
        resolved.query_params = self.resolve_pairs(&resolved.query_params)?;

        Ok(resolved)
    }

    fn resolve_pairs(&self, pairs: &[KeyValue]) -> Result<Vec<KeyValue>, CryptoError> {
        pairs
            .iter()
            .map(|pair| {
                if !pair.encrypted {
                    return Ok(pair.clone());
                }
                Ok(KeyValue {
                    key: pair.key.clone(),
                    value: self.crypto.decrypt_from_chain(&pair.value)?,
                    encrypted: false,
                })
            })
            .collect()
    }

    /// Perform the request described on-chain.
    pub async fn call(&self, request: &RequestData) -> Result<ApiResponse, CryptoError> {
        let resolved = self.resolve_confidential_fields(request)?;

        // Only the method is logged: the URL may be confidential.
        info!(
            method = %resolved.method,
            confidential = request.has_encrypted_fields(),
            "Calling external API"
        );

        let response = match self.send(&resolved).await {
            Ok(response) => response,
            Err(e) => {
                warn!(method = %resolved.method, error = %redact(&e), "External API call failed");
                ApiResponse::failed(e.to_string())
            }
        };
        Ok(response)
    }

    async fn send(&self, request: &RequestData) -> Result<ApiResponse, FetchError> {
        let mut builder = self
            .http
            .request(method_of(request.method), request.full_url())
            .timeout(self.timeout);

        for (key, value) in request.headers_map() {
            builder = builder.header(key, value);
        }

        if request.method.has_body() && !request.body.is_empty() {
            let json_body = request
                .header("content-type")
                .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));

            builder = if json_body {
                match serde_json::from_str::<Value>(&request.body) {
                    Ok(parsed) => builder.json(&parsed),
                    Err(_) => {
                        debug!("Request body is not valid JSON, sending as text");
                        builder.body(request.body.clone())
                    }
                }
            } else {
                builder.body(request.body.clone())
            };
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(e)
            } else {
                FetchError::Body(e.without_url().to_string())
            }
        })?;

        let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        if status.as_u16() < 400 {
            debug!(status = status.as_u16(), "External API call succeeded");
            return Ok(ApiResponse::ok(status.as_u16(), data));
        }

        Ok(ApiResponse {
            success: false,
            status: Some(status.as_u16()),
            data,
            error: Some(format!("Request failed with status {}", status.as_u16())),
        })
    }

    /// The URL is stripped: the message ends up in the on-chain payload and
    /// the URL may carry decrypted secrets.
    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout.as_secs_f64())
        } else {
            FetchError::Transport(error.without_url().to_string())
        }
    }
}

fn method_of(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
    }
}

/// Log-safe label for a fetch error.
fn redact(error: &FetchError) -> &'static str {
    match error {
        FetchError::Timeout(_) => "timeout",
        FetchError::Transport(_) => "transport error",
        FetchError::Body(_) => "unreadable body",
        FetchError::Client(_) => "client error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn crypto() -> Arc<CryptoService> {
        Arc::new(CryptoService::from_secret_bytes(&[9u8; 32]).unwrap())
    }

    fn client(crypto: Arc<CryptoService>, timeout: Duration) -> ApiClient {
        ApiClient::new(crypto, timeout).unwrap()
    }

    fn get_request(url: String) -> RequestData {
        RequestData {
            method: HttpMethod::Get,
            url,
            url_encrypted: false,
            headers: vec![],
            query_params: vec![],
            body: String::new(),
            body_encrypted: false,
            response_fields: vec![],
        }
    }

    #[tokio::test]
    async fn get_json_success() {
        let base = serve(Router::new().route(
            "/price",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                Json(json!({"symbol": q.get("symbol"), "price": 42}))
            }),
        ))
        .await;

        let mut request = get_request(format!("{base}/price"));
        request.query_params.push(KeyValue::plain("symbol", "ETH"));

        let response = client(crypto(), DEFAULT_API_TIMEOUT)
            .call(&request)
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.status, Some(200));
        assert_eq!(response.data, json!({"symbol": "ETH", "price": 42}));
    }

    #[tokio::test]
    async fn error_status_keeps_body() {
        let base = serve(Router::new().route(
            "/missing",
            get(|| async { (StatusCode::NOT_FOUND, Json(json!({"detail": "nope"}))) }),
        ))
        .await;

        let response = client(crypto(), DEFAULT_API_TIMEOUT)
            .call(&get_request(format!("{base}/missing")))
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.status, Some(404));
        assert_eq!(response.data, json!({"detail": "nope"}));
        assert_eq!(
            response.error.as_deref(),
            Some("Request failed with status 404")
        );
    }

    #[tokio::test]
    async fn text_body_is_kept_raw() {
        let base = serve(Router::new().route("/text", get(|| async { "hello there" }))).await;

        let response = client(crypto(), DEFAULT_API_TIMEOUT)
            .call(&get_request(format!("{base}/text")))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.data, Value::String("hello there".into()));
    }

    #[tokio::test]
    async fn confidential_fields_are_decrypted_before_sending() {
        let base = serve(Router::new().route(
            "/secure",
            get(
                |headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    Json(json!({"auth": auth, "key": q.get("key")}))
                },
            ),
        ))
        .await;

        let crypto = crypto();
        let request = RequestData {
            url: crypto.encrypt_for_chain(&format!("{base}/secure")).unwrap(),
            url_encrypted: true,
            headers: vec![KeyValue {
                key: "Authorization".into(),
                value: crypto.encrypt_for_chain("Bearer s3cret").unwrap(),
                encrypted: true,
            }],
            query_params: vec![KeyValue {
                key: "key".into(),
                value: crypto.encrypt_for_chain("k-123").unwrap(),
                encrypted: true,
            }],
            ..get_request(String::new())
        };

        let response = client(crypto, DEFAULT_API_TIMEOUT)
            .call(&request)
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.data, json!({"auth": "Bearer s3cret", "key": "k-123"}));
    }

    #[tokio::test]
    async fn repeated_header_sends_last_value_once() {
        let base = serve(Router::new().route(
            "/headers",
            get(|headers: HeaderMap| async move {
                let values: Vec<String> = headers
                    .get_all("x-feed")
                    .iter()
                    .filter_map(|v| v.to_str().ok())
                    .map(str::to_string)
                    .collect();
                Json(json!({ "xFeed": values }))
            }),
        ))
        .await;

        let request = RequestData {
            headers: vec![KeyValue::plain("X-Feed", "old"), KeyValue::plain("X-Feed", "new")],
            ..get_request(format!("{base}/headers"))
        };

        let response = client(crypto(), DEFAULT_API_TIMEOUT)
            .call(&request)
            .await
            .unwrap();
        assert_eq!(response.data, json!({"xFeed": ["new"]}));
    }

    #[tokio::test]
    async fn json_body_is_sent_as_json() {
        let base = serve(Router::new().route(
            "/echo",
            post(|Json(body): Json<Value>| async move { Json(json!({"received": body})) }),
        ))
        .await;

        let request = RequestData {
            method: HttpMethod::Post,
            headers: vec![KeyValue::plain("Content-Type", "application/json")],
            body: r#"{"amount": 5}"#.to_string(),
            ..get_request(format!("{base}/echo"))
        };

        let response = client(crypto(), DEFAULT_API_TIMEOUT)
            .call(&request)
            .await
            .unwrap();
        assert_eq!(response.data, json!({"received": {"amount": 5}}));
    }

    #[tokio::test]
    async fn slow_api_times_out() {
        let base = serve(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;

        let response = client(crypto(), Duration::from_millis(200))
            .call(&get_request(format!("{base}/slow")))
            .await
            .unwrap();
        assert!(!response.success);
        assert!(response.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn unreachable_api_is_a_failed_response() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let response = client(crypto(), DEFAULT_API_TIMEOUT)
            .call(&get_request(format!("http://{addr}/")))
            .await
            .unwrap();
        assert!(!response.success);
        assert!(response.error.unwrap().starts_with("Request failed"));
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_confidential_url() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let crypto = crypto();
        let request = RequestData {
            url: crypto
                .encrypt_for_chain(&format!("http://{addr}/private-feed"))
                .unwrap(),
            url_encrypted: true,
            query_params: vec![KeyValue {
                key: "apikey".into(),
                value: crypto.encrypt_for_chain("TOPSECRET123").unwrap(),
                encrypted: true,
            }],
            ..get_request(String::new())
        };

        let response = client(crypto, DEFAULT_API_TIMEOUT)
            .call(&request)
            .await
            .unwrap();
        let error = response.error.unwrap();
        assert!(error.starts_with("Request failed"));
        assert!(!error.contains("TOPSECRET123"));
        assert!(!error.contains("private-feed"));
    }

    #[test]
    fn resolve_leaves_input_and_conditions_untouched() {
        let crypto = crypto();
        let encrypted_threshold = crypto.encrypt_for_chain("10").unwrap();
        let request = RequestData {
            body: crypto.encrypt_for_chain("{\"a\":1}").unwrap(),
            body_encrypted: true,
            response_fields: vec![crate::models::ResponseField {
                path: "$.a".into(),
                response_type: "uint256".into(),
                condition: Some(crate::models::Condition {
                    operator: "gt".into(),
                    value: encrypted_threshold.clone(),
                    encrypted: true,
                }),
            }],
            ..get_request("https://api.example.com".into())
        };

        let api = client(crypto, DEFAULT_API_TIMEOUT);
        let resolved = api.resolve_confidential_fields(&request).unwrap();

        assert!(request.body_encrypted);
        assert_eq!(resolved.body, "{\"a\":1}");
        assert!(!resolved.has_encrypted_fields());
        assert_eq!(resolved.response_fields, request.response_fields);

        let again = api.resolve_confidential_fields(&resolved).unwrap();
        assert_eq!(again, resolved);
    }

    #[tokio::test]
    async fn bad_ciphertext_aborts_the_call() {
        let request = RequestData {
            url: "not-base64!".into(),
            url_encrypted: true,
            ..get_request(String::new())
        };
        let result = client(crypto(), DEFAULT_API_TIMEOUT).call(&request).await;
        assert!(result.is_err());
    }
}
