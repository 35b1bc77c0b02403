// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::crypto::CryptoService;

#[derive(Clone)]
pub struct AppState {
    pub crypto: Arc<CryptoService>,
    pub version: &'static str,
}

impl AppState {
    pub fn new(crypto: Arc<CryptoService>) -> Self {
        Self {
            crypto,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(CryptoService::new()))
    }
}
