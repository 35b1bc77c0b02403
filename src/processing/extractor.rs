// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSONPath extraction of response fields.
//!
//! Each [`ResponseField`] yields exactly one [`ExtractionResult`], in field
//! order, so the encoded payload always has one slot per requested field.
//! A field that cannot be extracted degrades to a null result and is
//! recorded in [`ExtractedData::field_errors`].

use std::sync::Arc;

use serde_json::Value;
use serde_json_path::JsonPath;
use tracing::{error, warn};

use crate::crypto::CryptoService;
use crate::models::{ApiResponse, ExtractedData, ExtractionResult, FieldError, ResponseField};
use crate::processing::coerce::{evaluate, is_integer_literal, ConditionError};

/// Per-field extraction failure.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Invalid JSONPath '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error(transparent)]
    Condition(#[from] ConditionError),
}

/// Accept bare paths (`a.b`, `[0].a`) as well as rooted ones (`$.a.b`).
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('$') {
        trimmed.to_string()
    } else if trimmed.starts_with('[') {
        format!("${trimmed}")
    } else {
        format!("$.{trimmed}")
    }
}

pub fn compile_path(path: &str) -> Result<JsonPath, ExtractionError> {
    let normalized = normalize_path(path);
    JsonPath::parse(&normalized).map_err(|e| ExtractionError::InvalidPath {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Natural on-chain type of an extracted JSON value.
///
/// Integers map by sign, whatever their width. Non-integral numbers map to
/// `int256`: the encoder scales them to a fixed-point integer.
pub fn infer_type_hint(value: &Value) -> Option<&'static str> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some("bool"),
        Value::Number(n) => {
            if is_integer_literal(n) && !n.to_string().starts_with('-') {
                Some("uint256")
            } else {
                Some("int256")
            }
        }
        Value::String(_) => Some("string"),
        Value::Array(_) => Some("array"),
        Value::Object(_) => Some("object"),
    }
}

/// Extracts response fields from API responses.
#[derive(Debug, Clone)]
pub struct ResponseExtractor {
    crypto: Arc<CryptoService>,
}

impl ResponseExtractor {
    pub fn new(crypto: Arc<CryptoService>) -> Self {
        Self { crypto }
    }

    /// Extract every field from `response`.
    pub fn extract(&self, fields: &[ResponseField], response: &ApiResponse) -> ExtractedData {
        if !response.success {
            return ExtractedData::failed(response.error.clone());
        }

        // Plain-text payloads have no structure to query.
        if let Value::String(raw) = &response.data {
            let results = fields
                .iter()
                .map(|field| ExtractionResult {
                    path: field.path.clone(),
                    value: Value::String(raw.clone()),
                    type_hint: Some("string".to_string()),
                })
                .collect();
            return ExtractedData {
                success: true,
                results,
                error: None,
                field_errors: Vec::new(),
            };
        }

        let mut results = Vec::with_capacity(fields.len());
        let mut field_errors = Vec::new();

        for (index, field) in fields.iter().enumerate() {
            match self.extract_field(field, &response.data) {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!(
                        index,
                        path = %field.path,
                        response_type = %field.response_type,
                        error = %e,
                        "Failed to extract response field"
                    );
                    field_errors.push(FieldError {
                        index,
                        path: field.path.clone(),
                        error: e.to_string(),
                    });
                    results.push(ExtractionResult::empty(field.path.clone()));
                }
            }
        }

        ExtractedData {
            success: true,
            results,
            error: None,
            field_errors,
        }
    }

    /// Extract a single field. The first match wins.
    pub fn extract_field(
        &self,
        field: &ResponseField,
        body: &Value,
    ) -> Result<ExtractionResult, ExtractionError> {
        let path = compile_path(&field.path)?;

        let Some(value) = path.query(body).first().cloned() else {
            warn!(path = %field.path, "No match for response field");
            return Ok(ExtractionResult::empty(field.path.clone()));
        };

        if let Some(condition) = field.predicate() {
            let passed = evaluate(condition, &value, &field.response_type, &self.crypto)?;
            return Ok(ExtractionResult {
                path: field.path.clone(),
                value: Value::Bool(passed),
                type_hint: Some("bool".to_string()),
            });
        }

        let type_hint = infer_type_hint(&value).map(str::to_string);
        Ok(ExtractionResult {
            path: field.path.clone(),
            value,
            type_hint,
        })
    }
}
