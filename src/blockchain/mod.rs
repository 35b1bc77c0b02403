// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM integration for the oracle contract.
//!
//! This module provides functionality for:
//! - Reading `RestApiRequest` events and the published encryption key
//! - Building, signing and confirming fulfillment transactions
//! - EIP-1559 fee parameters

pub mod client;
pub mod contract;
pub mod fees;

pub use client::{
    AlloyOracleChain, ChainError, OracleChain, SubmissionReceipt, DEFAULT_CONFIRMATION_TIMEOUT,
};
pub use fees::{fee_params, FeeParams, DEFAULT_GAS_LIMIT};
