// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Type coercion and condition evaluation.
//!
//! Extracted values are untyped JSON; declared response types are on-chain
//! type names. [`coerce`] bridges the two leniently: it never fails, and a
//! value that cannot be converted is returned in its natural shape (with a
//! warning) rather than rejected. Conditions compare the coerced extracted
//! value against the coerced condition operand.

use std::cmp::Ordering;

use serde_json::{Number, Value};
use tracing::warn;

use crate::crypto::{CryptoError, CryptoService};
use crate::models::Condition;

/// Strings recognised as `true` when coercing to a boolean.
const TRUTHY: [&str; 5] = ["true", "yes", "1", "t", "y"];

/// Whether `n` was written as an integer (no fraction, no exponent).
///
/// Relies on serde_json keeping the lexical form of numbers, so integers
/// beyond the 64-bit range are still recognised exactly.
pub fn is_integer_literal(n: &Number) -> bool {
    !n.to_string().contains(['.', 'e', 'E'])
}

/// A JSON value converted toward a declared on-chain type.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Null,
    Bool(bool),
    Integer(i128),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// Sequences and mappings, kept as JSON.
    Raw(Value),
}

impl Coerced {
    /// Natural shape of a JSON value, with no target type applied.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Coerced::Null,
            Value::Bool(b) => Coerced::Bool(*b),
            Value::Number(n) => match n.as_i128() {
                Some(i) => Coerced::Integer(i),
                None => Coerced::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Coerced::Text(s.clone()),
            other => Coerced::Raw(other.clone()),
        }
    }

    /// Generic string form, used by the substring operators.
    pub fn to_text(&self) -> String {
        match self {
            Coerced::Null => "null".to_string(),
            Coerced::Bool(b) => b.to_string(),
            Coerced::Integer(i) => i.to_string(),
            Coerced::Float(f) => f.to_string(),
            Coerced::Text(s) => s.clone(),
            Coerced::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Coerced::Raw(Value::String(s)) => s.clone(),
            Coerced::Raw(v) => v.to_string(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Coerced::Null => "null",
            Coerced::Bool(_) => "bool",
            Coerced::Integer(_) => "integer",
            Coerced::Float(_) => "float",
            Coerced::Text(_) => "string",
            Coerced::Bytes(_) => "bytes",
            Coerced::Raw(_) => "json",
        }
    }
}

/// Family of a declared response type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Integer,
    Bool,
    Text,
    Address,
    Bytes,
    /// Arrays, objects and unknown names: no conversion.
    Passthrough,
}

impl TargetKind {
    pub fn of(type_name: &str) -> Self {
        let name = type_name.trim().to_ascii_lowercase();
        if name.ends_with(']') {
            TargetKind::Passthrough
        } else if name.starts_with("uint") || name.starts_with("int") {
            TargetKind::Integer
        } else if name == "bool" || name == "boolean" {
            TargetKind::Bool
        } else if name == "string" {
            TargetKind::Text
        } else if name == "address" {
            TargetKind::Address
        } else if name.starts_with("bytes") {
            TargetKind::Bytes
        } else {
            TargetKind::Passthrough
        }
    }
}

/// Convert `value` toward `target_type`. Never fails; see module docs.
pub fn coerce(value: &Value, target_type: &str) -> Coerced {
    match try_coerce(value, TargetKind::of(target_type)) {
        Ok(coerced) => coerced,
        Err(reason) => {
            warn!(
                target_type,
                value = %value,
                reason = %reason,
                "Could not coerce value, keeping original"
            );
            Coerced::from_json(value)
        }
    }
}

fn try_coerce(value: &Value, kind: TargetKind) -> Result<Coerced, String> {
    match kind {
        TargetKind::Integer => to_integer(value).map(Coerced::Integer),
        TargetKind::Bool => Ok(Coerced::Bool(to_bool(value))),
        TargetKind::Text => Ok(Coerced::Text(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        TargetKind::Address => match value {
            Value::String(s) => {
                let lower = s.trim().to_ascii_lowercase();
                if lower.starts_with("0x") {
                    Ok(Coerced::Text(lower))
                } else {
                    Ok(Coerced::Text(format!("0x{lower}")))
                }
            }
            other => Err(format!("cannot use {other} as an address")),
        },
        TargetKind::Bytes => match value {
            Value::String(s) => Ok(Coerced::Bytes(s.as_bytes().to_vec())),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| format!("{item} is not a byte"))
                })
                .collect::<Result<Vec<u8>, _>>()
                .map(Coerced::Bytes),
            other => Err(format!("cannot use {other} as bytes")),
        },
        TargetKind::Passthrough => Ok(Coerced::from_json(value)),
    }
}

/// Float parse then truncation, so `"5.0"` and `5.9` both become `5`.
fn to_integer(value: &Value) -> Result<i128, String> {
    let float = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i128() {
                return Ok(i);
            }
            n.as_f64().ok_or_else(|| format!("{n} is not representable"))?
        }
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("{s:?} is not numeric: {e}"))?,
        Value::Bool(b) => return Ok(i128::from(*b)),
        other => return Err(format!("cannot use {other} as an integer")),
    };

    let truncated = float.trunc();
    if !truncated.is_finite() || truncated.abs() >= i128::MAX as f64 {
        return Err(format!("{float} is out of integer range"));
    }
    Ok(truncated as i128)
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => TRUTHY.contains(&s.trim().to_ascii_lowercase().as_str()),
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

// =============================================================================
// Conditions
// =============================================================================

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    /// Parse an operator, case-insensitively.
    ///
    /// | Operator | Accepted spellings |
    /// |----------|--------------------|
    /// | equals | `eq`, `=`, `==`, `equals`, `equal` |
    /// | not-equals | `ne`, `neq`, `!=`, `<>`, `not_equals`, `not_equal` |
    /// | greater-than | `gt`, `>`, `greater_than` |
    /// | greater-or-equal | `gte`, `ge`, `>=`, `greater_or_equal`, `greater_than_or_equal` |
    /// | less-than | `lt`, `<`, `less_than` |
    /// | less-or-equal | `lte`, `le`, `<=`, `less_or_equal`, `less_than_or_equal` |
    /// | contains | `contains`, `includes` |
    /// | starts-with | `starts_with`, `startswith` |
    /// | ends-with | `ends_with`, `endswith` |
    ///
    /// `-` and spaces are treated as `_`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replace(['-', ' '], "_");

        let op = match normalized.as_str() {
            "eq" | "=" | "==" | "equals" | "equal" => Operator::Equals,
            "ne" | "neq" | "!=" | "<>" | "not_equals" | "not_equal" => Operator::NotEquals,
            "gt" | ">" | "greater_than" => Operator::GreaterThan,
            "gte" | "ge" | ">=" | "greater_or_equal" | "greater_than_or_equal" => {
                Operator::GreaterOrEqual
            }
            "lt" | "<" | "less_than" => Operator::LessThan,
            "lte" | "le" | "<=" | "less_or_equal" | "less_than_or_equal" => Operator::LessOrEqual,
            "contains" | "includes" => Operator::Contains,
            "starts_with" | "startswith" => Operator::StartsWith,
            "ends_with" | "endswith" => Operator::EndsWith,
            _ => return None,
        };
        Some(op)
    }

    fn is_ordering(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::GreaterOrEqual
                | Operator::LessThan
                | Operator::LessOrEqual
        )
    }
}

/// Errors raised while evaluating a condition.
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    #[error("Could not decrypt condition value: {0}")]
    Decryption(#[from] CryptoError),

    #[error("Cannot order {left} against {right} for operator {operator:?}")]
    NotOrderable {
        operator: Operator,
        left: &'static str,
        right: &'static str,
    },
}

/// Evaluate `condition` against an extracted value.
///
/// Both operands are coerced to `response_type` first. An unknown operator
/// evaluates to `false`.
pub fn evaluate(
    condition: &Condition,
    extracted: &Value,
    response_type: &str,
    crypto: &CryptoService,
) -> Result<bool, ConditionError> {
    let Some(operator) = Operator::parse(&condition.operator) else {
        warn!(operator = %condition.operator, "Unknown condition operator, evaluating to false");
        return Ok(false);
    };

    let expected = if condition.encrypted {
        crypto.decrypt_from_chain(&condition.value)?
    } else {
        condition.value.clone()
    };

    let left = coerce(extracted, response_type);
    let right = coerce(&Value::String(expected), response_type);

    apply(operator, &left, &right)
}

/// Apply an operator to two coerced operands.
pub fn apply(operator: Operator, left: &Coerced, right: &Coerced) -> Result<bool, ConditionError> {
    match operator {
        Operator::Contains => return Ok(left.to_text().contains(&right.to_text())),
        Operator::StartsWith => return Ok(left.to_text().starts_with(&right.to_text())),
        Operator::EndsWith => return Ok(left.to_text().ends_with(&right.to_text())),
        Operator::Equals => return Ok(equals(left, right)),
        Operator::NotEquals => return Ok(!equals(left, right)),
        _ => {}
    }
    debug_assert!(operator.is_ordering());

    let ordering = compare(left, right).ok_or(ConditionError::NotOrderable {
        operator,
        left: left.kind(),
        right: right.kind(),
    })?;

    Ok(match operator {
        Operator::GreaterThan => ordering == Ordering::Greater,
        Operator::GreaterOrEqual => ordering != Ordering::Less,
        Operator::LessThan => ordering == Ordering::Less,
        Operator::LessOrEqual => ordering != Ordering::Greater,
        _ => false,
    })
}

fn compare(left: &Coerced, right: &Coerced) -> Option<Ordering> {
    match (left, right) {
        (Coerced::Integer(a), Coerced::Integer(b)) => Some(a.cmp(b)),
        (Coerced::Integer(_) | Coerced::Float(_), Coerced::Integer(_) | Coerced::Float(_)) => {
            as_f64(left)?.partial_cmp(&as_f64(right)?)
        }
        (Coerced::Bool(a), Coerced::Bool(b)) => Some(a.cmp(b)),
        (Coerced::Text(a), Coerced::Text(b)) => Some(a.cmp(b)),
        (Coerced::Bytes(a), Coerced::Bytes(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn equals(left: &Coerced, right: &Coerced) -> bool {
    match compare(left, right) {
        Some(ordering) => ordering == Ordering::Equal,
        None => left == right,
    }
}

fn as_f64(value: &Coerced) -> Option<f64> {
    match value {
        Coerced::Integer(i) => Some(*i as f64),
        Coerced::Float(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(operator: &str, value: &str) -> Condition {
        Condition {
            operator: operator.to_string(),
            value: value.to_string(),
            encrypted: false,
        }
    }

    fn crypto() -> CryptoService {
        CryptoService::from_secret_bytes(&[3u8; 32]).unwrap()
    }

    #[test]
    fn integers_truncate_through_float_parsing() {
        assert_eq!(coerce(&json!("5.0"), "uint256"), Coerced::Integer(5));
        assert_eq!(coerce(&json!("5.9"), "uint256"), Coerced::Integer(5));
        assert_eq!(coerce(&json!(-7.8), "int256"), Coerced::Integer(-7));
        assert_eq!(coerce(&json!(42), "uint8"), Coerced::Integer(42));
    }

    #[test]
    fn wide_integers_stay_exact() {
        let wei: Value = serde_json::from_str("20000000000000000001").unwrap();
        assert_eq!(coerce(&wei, "uint256"), Coerced::Integer(20_000_000_000_000_000_001));
        assert_eq!(Coerced::from_json(&wei), Coerced::Integer(20_000_000_000_000_000_001));
    }

    #[test]
    fn integer_literals_are_recognised_by_form() {
        let literal = |raw: &str| match serde_json::from_str::<Value>(raw).unwrap() {
            Value::Number(n) => is_integer_literal(&n),
            other => panic!("not a number: {other}"),
        };
        assert!(literal("42"));
        assert!(literal("-7"));
        assert!(literal("20000000000000000000"));
        assert!(!literal("1.0"));
        assert!(!literal("1.5e21"));
        assert!(!literal("2E3"));
    }

    #[test]
    fn unconvertible_values_keep_their_shape() {
        assert_eq!(
            coerce(&json!("abc"), "uint256"),
            Coerced::Text("abc".to_string())
        );
        assert_eq!(coerce(&json!(null), "int256"), Coerced::Null);
        assert_eq!(coerce(&json!(12), "address"), Coerced::Integer(12));
    }

    #[test]
    fn booleans_use_truthy_set() {
        for truthy in ["true", "YES", "1", "t", "Y"] {
            assert_eq!(coerce(&json!(truthy), "bool"), Coerced::Bool(true));
        }
        for falsy in ["false", "no", "0", "maybe", ""] {
            assert_eq!(coerce(&json!(falsy), "bool"), Coerced::Bool(false));
        }
        assert_eq!(coerce(&json!(true), "bool"), Coerced::Bool(true));
        assert_eq!(coerce(&json!(0), "bool"), Coerced::Bool(false));
        assert_eq!(coerce(&json!([1]), "bool"), Coerced::Bool(true));
        assert_eq!(coerce(&json!({}), "bool"), Coerced::Bool(false));
    }

    #[test]
    fn addresses_are_prefixed_and_lowercased() {
        assert_eq!(
            coerce(&json!("ABCDEF"), "address"),
            Coerced::Text("0xabcdef".to_string())
        );
        assert_eq!(
            coerce(&json!("0xAbC"), "address"),
            Coerced::Text("0xabc".to_string())
        );
    }

    #[test]
    fn strings_and_bytes() {
        assert_eq!(coerce(&json!(42), "string"), Coerced::Text("42".to_string()));
        assert_eq!(
            coerce(&json!("hi"), "bytes"),
            Coerced::Bytes(b"hi".to_vec())
        );
        assert_eq!(
            coerce(&json!([1, 2, 255]), "bytes32"),
            Coerced::Bytes(vec![1, 2, 255])
        );
    }

    #[test]
    fn operator_aliases() {
        assert_eq!(Operator::parse("GT"), Some(Operator::GreaterThan));
        assert_eq!(Operator::parse(">="), Some(Operator::GreaterOrEqual));
        assert_eq!(Operator::parse("not-equals"), Some(Operator::NotEquals));
        assert_eq!(Operator::parse("Starts With"), Some(Operator::StartsWith));
        assert_eq!(Operator::parse("endswith"), Some(Operator::EndsWith));
        assert_eq!(Operator::parse("between"), None);
    }

    #[test]
    fn numeric_conditions() {
        let crypto = crypto();
        let eval = |op, v, extracted: Value| {
            evaluate(&condition(op, v), &extracted, "uint256", &crypto).unwrap()
        };
        assert!(eval("gt", "10", json!(42)));
        assert!(!eval("lt", "10", json!(42)));
        assert!(eval("gte", "42", json!(42)));
        assert!(eval("lte", "42.7", json!(42)));
        assert!(eval("eq", "42", json!("42.0")));
        assert!(eval("ne", "41", json!(42)));
    }

    #[test]
    fn string_conditions() {
        let crypto = crypto();
        let eval = |op, v, extracted: Value| {
            evaluate(&condition(op, v), &extracted, "string", &crypto).unwrap()
        };
        assert!(eval("contains", "lo wo", json!("hello world")));
        assert!(eval("starts_with", "hell", json!("hello")));
        assert!(eval("ends_with", "llo", json!("hello")));
        assert!(eval("equals", "hello", json!("hello")));
        assert!(eval("gt", "abc", json!("abd")));
    }

    #[test]
    fn substring_operators_use_string_form() {
        let crypto = crypto();
        let result =
            evaluate(&condition("contains", "4"), &json!(1042), "uint256", &crypto).unwrap();
        assert!(result);
    }

    #[test]
    fn unknown_operator_is_false() {
        let crypto = crypto();
        let result = evaluate(&condition("between", "1"), &json!(5), "uint256", &crypto).unwrap();
        assert!(!result);
    }

    #[test]
    fn unorderable_operands_are_an_error() {
        let crypto = crypto();
        let result = evaluate(&condition("gt", "10"), &json!([1, 2]), "array", &crypto);
        assert!(matches!(result, Err(ConditionError::NotOrderable { .. })));
    }

    #[test]
    fn encrypted_condition_value_is_decrypted() {
        let crypto = crypto();
        let secret_threshold = crypto.encrypt_for_chain("100").unwrap();
        let cond = Condition {
            operator: "gt".to_string(),
            value: secret_threshold,
            encrypted: true,
        };
        assert!(evaluate(&cond, &json!(150), "uint256", &crypto).unwrap());
        assert!(!evaluate(&cond, &json!(50), "uint256", &crypto).unwrap());
    }

    #[test]
    fn undecryptable_condition_value_is_an_error() {
        let crypto = crypto();
        let cond = Condition {
            operator: "eq".to_string(),
            value: "garbage".to_string(),
            encrypted: true,
        };
        assert!(matches!(
            evaluate(&cond, &json!(1), "uint256", &crypto),
            Err(ConditionError::Decryption(_))
        ));
    }
}
