// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ABI encoding of extracted values.
//!
//! The encoded payload is the standard ABI parameter encoding of one value
//! per extracted field, typed by its type hint. Failures never abort a
//! request: the payload becomes the UTF-8 bytes of an error message instead,
//! so the requester always receives a response.

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{Address, FixedBytes, Sign, I256, U256};
use serde_json::{Number, Value};
use tracing::error;

use crate::models::{ExtractedData, ExtractionResult};
use crate::processing::coerce::is_integer_literal;

/// Fixed-point scale applied to non-integral numbers.
pub const DEFAULT_FLOAT_DECIMALS: u8 = 18;

/// Type used for results that carry no hint (null values).
const FALLBACK_TYPE: &str = "bytes";

#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("unsupported type '{type_name}': {reason}")]
    UnsupportedType { type_name: String, reason: String },

    #[error("value {value} does not fit type {type_name}")]
    TypeMismatch { type_name: String, value: String },

    #[error("value {value} overflows {type_name}")]
    Overflow { type_name: String, value: String },
}

impl EncodingError {
    fn mismatch(ty: &DynSolType, value: &Value) -> Self {
        EncodingError::TypeMismatch {
            type_name: ty.sol_type_name().into_owned(),
            value: value.to_string(),
        }
    }

    fn overflow(ty: &DynSolType, value: impl ToString) -> Self {
        EncodingError::Overflow {
            type_name: ty.sol_type_name().into_owned(),
            value: value.to_string(),
        }
    }
}

/// Encodes extracted data for on-chain submission.
#[derive(Debug, Clone, Copy)]
pub struct OnChainEncoder {
    float_decimals: u8,
}

impl Default for OnChainEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_FLOAT_DECIMALS)
    }
}

impl OnChainEncoder {
    pub fn new(float_decimals: u8) -> Self {
        Self { float_decimals }
    }

    /// Bytes submitted on-chain for `extracted`. Never fails.
    pub fn encode(&self, extracted: &ExtractedData) -> Vec<u8> {
        if !extracted.success {
            let message = extracted.error.as_deref().unwrap_or("Unknown error");
            return message.as_bytes().to_vec();
        }

        match self.try_encode(&extracted.results) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(error = %e, fields = extracted.results.len(), "Failed to encode response");
                format!("Encoding error: {e}").into_bytes()
            }
        }
    }

    /// ABI parameter encoding of the results.
    pub fn try_encode(&self, results: &[ExtractionResult]) -> Result<Vec<u8>, EncodingError> {
        let values = results
            .iter()
            .map(|result| {
                let type_name = result.type_hint.as_deref().unwrap_or(FALLBACK_TYPE);
                let ty = DynSolType::parse(type_name).map_err(|e| {
                    EncodingError::UnsupportedType {
                        type_name: type_name.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                self.to_sol_value(&result.value, &ty)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DynSolValue::Tuple(values).abi_encode_params())
    }

    fn to_sol_value(&self, value: &Value, ty: &DynSolType) -> Result<DynSolValue, EncodingError> {
        if value.is_null() {
            return default_value(ty);
        }

        match ty {
            DynSolType::Bool => value
                .as_bool()
                .map(DynSolValue::Bool)
                .ok_or_else(|| EncodingError::mismatch(ty, value)),

            DynSolType::Uint(bits) => {
                let Value::Number(n) = value else {
                    return Err(EncodingError::mismatch(ty, value));
                };
                let raw = self.uint_from_number(n, ty)?;
                if raw.bit_len() > *bits {
                    return Err(EncodingError::overflow(ty, n));
                }
                Ok(DynSolValue::Uint(raw, *bits))
            }

            DynSolType::Int(bits) => {
                let Value::Number(n) = value else {
                    return Err(EncodingError::mismatch(ty, value));
                };
                let raw = self.int_from_number(n, ty)?;
                if *bits < 256 {
                    let limit = I256::ONE << (*bits - 1);
                    if raw >= limit || raw < -limit {
                        return Err(EncodingError::overflow(ty, n));
                    }
                }
                Ok(DynSolValue::Int(raw, *bits))
            }

            DynSolType::String => value
                .as_str()
                .map(|s| DynSolValue::String(s.to_string()))
                .ok_or_else(|| EncodingError::mismatch(ty, value)),

            DynSolType::Bytes => match value {
                Value::String(s) => Ok(DynSolValue::Bytes(s.as_bytes().to_vec())),
                Value::Array(items) => Ok(DynSolValue::Bytes(byte_array(items, ty, value)?)),
                _ => Err(EncodingError::mismatch(ty, value)),
            },

            DynSolType::FixedBytes(size) => {
                let bytes = match value {
                    Value::String(s) => alloy::hex::decode(s.trim())
                        .map_err(|_| EncodingError::mismatch(ty, value))?,
                    Value::Array(items) => byte_array(items, ty, value)?,
                    _ => return Err(EncodingError::mismatch(ty, value)),
                };
                if bytes.len() != *size {
                    return Err(EncodingError::mismatch(ty, value));
                }
                let mut word = [0u8; 32];
                word[..*size].copy_from_slice(&bytes);
                Ok(DynSolValue::FixedBytes(FixedBytes::from(word), *size))
            }

            DynSolType::Address => value
                .as_str()
                .and_then(|s| s.trim().parse::<Address>().ok())
                .map(DynSolValue::Address)
                .ok_or_else(|| EncodingError::mismatch(ty, value)),

            DynSolType::Array(inner) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| EncodingError::mismatch(ty, value))?;
                let values = items
                    .iter()
                    .map(|item| self.to_sol_value(item, inner))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DynSolValue::Array(values))
            }

            DynSolType::FixedArray(inner, size) => {
                let items = value
                    .as_array()
                    .filter(|items| items.len() == *size)
                    .ok_or_else(|| EncodingError::mismatch(ty, value))?;
                let values = items
                    .iter()
                    .map(|item| self.to_sol_value(item, inner))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DynSolValue::FixedArray(values))
            }

            DynSolType::Tuple(types) => {
                let items = value
                    .as_array()
                    .filter(|items| items.len() == types.len())
                    .ok_or_else(|| EncodingError::mismatch(ty, value))?;
                let values = items
                    .iter()
                    .zip(types)
                    .map(|(item, inner)| self.to_sol_value(item, inner))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DynSolValue::Tuple(values))
            }

            other => Err(EncodingError::UnsupportedType {
                type_name: other.sol_type_name().into_owned(),
                reason: "not encodable from JSON".to_string(),
            }),
        }
    }

    fn uint_from_number(&self, n: &Number, ty: &DynSolType) -> Result<U256, EncodingError> {
        if is_integer_literal(n) {
            return U256::from_str_radix(&n.to_string(), 10)
                .map_err(|_| EncodingError::overflow(ty, n));
        }
        match self.scale(n, ty)? {
            (Sign::Negative, magnitude) if !magnitude.is_zero() => {
                Err(EncodingError::overflow(ty, n))
            }
            (_, magnitude) => Ok(magnitude),
        }
    }

    fn int_from_number(&self, n: &Number, ty: &DynSolType) -> Result<I256, EncodingError> {
        if is_integer_literal(n) {
            return I256::from_dec_str(&n.to_string())
                .map_err(|_| EncodingError::overflow(ty, n));
        }
        let (sign, magnitude) = self.scale(n, ty)?;
        I256::checked_from_sign_and_abs(sign, magnitude)
            .ok_or_else(|| EncodingError::overflow(ty, n))
    }

    /// `value * 10^decimals`, truncated toward zero, as sign and magnitude.
    fn scale(&self, n: &Number, ty: &DynSolType) -> Result<(Sign, U256), EncodingError> {
        let float = n.as_f64().ok_or_else(|| EncodingError::overflow(ty, n))?;
        let scaled = (float * 10f64.powi(i32::from(self.float_decimals))).trunc();
        let sign = if scaled.is_sign_negative() {
            Sign::Negative
        } else {
            Sign::Positive
        };
        let magnitude =
            U256::try_from(scaled.abs()).map_err(|_| EncodingError::overflow(ty, n))?;
        Ok((sign, magnitude))
    }
}

/// Zero value used for null results.
fn default_value(ty: &DynSolType) -> Result<DynSolValue, EncodingError> {
    Ok(match ty {
        DynSolType::Bool => DynSolValue::Bool(false),
        DynSolType::Uint(bits) => DynSolValue::Uint(U256::ZERO, *bits),
        DynSolType::Int(bits) => DynSolValue::Int(I256::ZERO, *bits),
        DynSolType::String => DynSolValue::String(String::new()),
        DynSolType::Bytes => DynSolValue::Bytes(Vec::new()),
        DynSolType::FixedBytes(size) => DynSolValue::FixedBytes(FixedBytes::ZERO, *size),
        DynSolType::Address => DynSolValue::Address(Address::ZERO),
        DynSolType::Array(_) => DynSolValue::Array(Vec::new()),
        DynSolType::FixedArray(inner, size) => {
            DynSolValue::FixedArray(vec![default_value(inner)?; *size])
        }
        DynSolType::Tuple(types) => DynSolValue::Tuple(
            types
                .iter()
                .map(default_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        other => {
            return Err(EncodingError::UnsupportedType {
                type_name: other.sol_type_name().into_owned(),
                reason: "no default value".to_string(),
            })
        }
    })
}

fn byte_array(items: &[Value], ty: &DynSolType, value: &Value) -> Result<Vec<u8>, EncodingError> {
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|b| u8::try_from(b).ok())
                .ok_or_else(|| EncodingError::mismatch(ty, value))
        })
        .collect()
}
