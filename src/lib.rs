// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TEE Oracle - Confidential REST Oracle Bridge
//!
//! This crate watches an oracle contract for REST API requests, performs
//! them from inside a TEE, and submits the ABI-encoded answer on-chain.
//! Request fields may be encrypted to the oracle's key so requesters can
//! pass API keys or secret thresholds without revealing them on-chain.
//!
//! ## Modules
//!
//! - `bridge` - Poll loop, block cursor and per-event pipeline
//! - `blockchain` - Oracle contract bindings and EVM access (alloy)
//! - `crypto` - Confidential field codec and enclave key derivation
//! - `fetch` - Outbound REST client
//! - `processing` - JSONPath extraction, conditions and ABI encoding
//! - `api` - Control-plane HTTP handlers (Axum)

pub mod api;
pub mod blockchain;
pub mod bridge;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fetch;
pub mod models;
pub mod processing;
pub mod state;
