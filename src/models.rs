// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request and response models shared by the oracle pipeline.
//!
//! Every value here is produced once and never mutated in place: each
//! pipeline stage derives a new value from the previous one, so a failed
//! stage never leaves a half-processed request behind.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Request Types
// =============================================================================

/// HTTP method, encoded on-chain as an enum ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Upper-case method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Whether the method carries a request body.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl TryFrom<u8> for HttpMethod {
    type Error = String;

    fn try_from(ordinal: u8) -> Result<Self, Self::Error> {
        match ordinal {
            0 => Ok(HttpMethod::Get),
            1 => Ok(HttpMethod::Post),
            2 => Ok(HttpMethod::Put),
            3 => Ok(HttpMethod::Delete),
            4 => Ok(HttpMethod::Patch),
            other => Err(format!("unknown HTTP method ordinal {other}")),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header or query parameter. `value` is ciphertext when `encrypted` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub encrypted: bool,
}

impl KeyValue {
    pub fn plain(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            encrypted: false,
        }
    }
}

/// Predicate attached to a response field.
///
/// The operator is matched case-insensitively; see
/// [`crate::processing::coerce::Operator`] for the accepted spellings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub operator: String,
    pub value: String,
    #[serde(default)]
    pub encrypted: bool,
}

/// One value to extract from the API response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseField {
    /// JSONPath expression into the response body.
    pub path: String,
    /// Declared on-chain type of the raw value.
    pub response_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl ResponseField {
    /// The condition, if it carries a non-empty operator.
    ///
    /// The contract always emits a condition tuple, so an empty operator
    /// means "no predicate".
    pub fn predicate(&self) -> Option<&Condition> {
        self.condition
            .as_ref()
            .filter(|c| !c.operator.trim().is_empty())
    }
}

/// REST API request as emitted by the oracle contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub url_encrypted: bool,
    #[serde(default)]
    pub headers: Vec<KeyValue>,
    #[serde(default)]
    pub query_params: Vec<KeyValue>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub body_encrypted: bool,
    /// Output order on-chain follows this order.
    pub response_fields: Vec<ResponseField>,
}

impl RequestData {
    /// Headers as a map. Later duplicates win.
    pub fn headers_map(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .map(|h| (h.key.clone(), h.value.clone()))
            .collect()
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|h| h.key.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// URL with query parameters appended.
    ///
    /// Uses `&` as the connector when the base URL already has a query.
    pub fn full_url(&self) -> String {
        if self.query_params.is_empty() {
            return self.url.clone();
        }

        let query = self
            .query_params
            .iter()
            .map(|p| format!("{}={}", p.key, p.value))
            .collect::<Vec<_>>()
            .join("&");
        let connector = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.url, connector, query)
    }

    /// Whether any request-level field still holds ciphertext.
    ///
    /// Condition values are not considered: they are decrypted lazily when
    /// the condition is evaluated.
    pub fn has_encrypted_fields(&self) -> bool {
        self.url_encrypted
            || self.body_encrypted
            || self.headers.iter().any(|h| h.encrypted)
            || self.query_params.iter().any(|p| p.encrypted)
    }
}

/// Decoded `RestApiRequest` log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEvent {
    /// `0x`-prefixed hex of the 32-byte request id.
    pub request_id: String,
    /// Checksummed requester address.
    pub requester: String,
    pub request: RequestData,
    pub block_number: u64,
    /// Position within the block, used to order events.
    #[serde(default)]
    pub log_index: u64,
    pub transaction_hash: String,
}

// =============================================================================
// Response Types
// =============================================================================

/// Outcome of one external API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Parsed JSON body, or `Value::String` holding the raw text.
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(status: u16, data: Value) -> Self {
        Self {
            success: true,
            status: Some(status),
            data,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            data: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Value extracted for one response field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub path: String,
    pub value: Value,
    pub type_hint: Option<String>,
}

impl ExtractionResult {
    /// Result for a field that produced nothing.
    pub fn empty(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: Value::Null,
            type_hint: None,
        }
    }
}

/// A field whose extraction failed, kept next to the null result it
/// degraded to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub index: usize,
    pub path: String,
    pub error: String,
}

/// All values extracted from one API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    pub success: bool,
    pub results: Vec<ExtractionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

impl ExtractedData {
    pub fn failed(error: Option<String>) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            error,
            field_errors: Vec::new(),
        }
    }
}

/// Final result for one request, ready for submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedResponse {
    pub request_id: String,
    pub requester: String,
    pub success: bool,
    pub data: Vec<ExtractionResult>,
    #[serde(skip)]
    pub encoded_data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str, params: Vec<KeyValue>) -> RequestData {
        RequestData {
            method: HttpMethod::Get,
            url: url.to_string(),
            url_encrypted: false,
            headers: vec![],
            query_params: params,
            body: String::new(),
            body_encrypted: false,
            response_fields: vec![],
        }
    }

    #[test]
    fn full_url_appends_query_params() {
        let req = request(
            "https://api.example.com/price",
            vec![KeyValue::plain("symbol", "ETH"), KeyValue::plain("fiat", "USD")],
        );
        assert_eq!(
            req.full_url(),
            "https://api.example.com/price?symbol=ETH&fiat=USD"
        );
    }

    #[test]
    fn full_url_detects_existing_query() {
        let req = request(
            "https://api.example.com/price?v=2",
            vec![KeyValue::plain("symbol", "ETH")],
        );
        assert_eq!(req.full_url(), "https://api.example.com/price?v=2&symbol=ETH");
    }

    #[test]
    fn full_url_without_params_is_unchanged() {
        let req = request("https://api.example.com/price", vec![]);
        assert_eq!(req.full_url(), "https://api.example.com/price");
    }

    #[test]
    fn method_ordinals_match_contract_enum() {
        assert_eq!(HttpMethod::try_from(0).unwrap(), HttpMethod::Get);
        assert_eq!(HttpMethod::try_from(4).unwrap(), HttpMethod::Patch);
        assert!(HttpMethod::try_from(5).is_err());
        assert!(HttpMethod::Post.has_body());
        assert!(!HttpMethod::Delete.has_body());
    }

    #[test]
    fn empty_operator_is_not_a_predicate() {
        let field = ResponseField {
            path: "$.a".to_string(),
            response_type: "uint256".to_string(),
            condition: Some(Condition {
                operator: " ".to_string(),
                value: String::new(),
                encrypted: false,
            }),
        };
        assert!(field.predicate().is_none());
    }

    #[test]
    fn headers_map_keeps_last_duplicate() {
        let mut req = request("https://x", vec![]);
        req.headers.push(KeyValue::plain("Accept", "text/plain"));
        req.headers.push(KeyValue::plain("Accept", "application/json"));
        req.headers.push(KeyValue::plain("X-Api-Key", "k"));

        let map = req.headers_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["Accept"], "application/json");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut req = request("https://x", vec![]);
        req.headers.push(KeyValue::plain("Content-Type", "application/json"));
        assert_eq!(req.header("content-type"), Some("application/json"));
    }
}
