// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Response processing: extraction, conditions and on-chain encoding.

pub mod coerce;
pub mod encoder;
pub mod extractor;

pub use coerce::{coerce, evaluate, is_integer_literal, Coerced, ConditionError, Operator};
pub use encoder::{EncodingError, OnChainEncoder, DEFAULT_FLOAT_DECIMALS};
pub use extractor::{ExtractionError, ResponseExtractor};
