// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-event pipeline: fetch, extract, encode, submit.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::RequestHandler;
use crate::blockchain::{ChainError, OracleChain};
use crate::crypto::{CryptoError, CryptoService};
use crate::fetch::ApiClient;
use crate::models::{ProcessedResponse, RequestEvent};
use crate::processing::{OnChainEncoder, ResponseExtractor};

/// Failure of one event.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Confidential field could not be decrypted: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// The production [`RequestHandler`].
pub struct OraclePipeline<C> {
    api: ApiClient,
    extractor: ResponseExtractor,
    encoder: OnChainEncoder,
    chain: Arc<C>,
}

impl<C: OracleChain> OraclePipeline<C> {
    pub fn new(
        api: ApiClient,
        crypto: Arc<CryptoService>,
        encoder: OnChainEncoder,
        chain: Arc<C>,
    ) -> Self {
        Self {
            api,
            extractor: ResponseExtractor::new(crypto),
            encoder,
            chain,
        }
    }

    /// Fetch, extract and encode without submitting.
    ///
    /// API failures are encoded into the payload; only a decryption failure
    /// is an error.
    pub async fn process(&self, event: &RequestEvent) -> Result<ProcessedResponse, CryptoError> {
        let response = self.api.call(&event.request).await?;
        let extracted = self
            .extractor
            .extract(&event.request.response_fields, &response);
        let encoded_data = self.encoder.encode(&extracted);

        Ok(ProcessedResponse {
            request_id: event.request_id.clone(),
            requester: event.requester.clone(),
            success: extracted.success,
            data: extracted.results,
            encoded_data,
        })
    }
}

#[async_trait]
impl<C: OracleChain> RequestHandler for OraclePipeline<C> {
    async fn handle(&self, event: &RequestEvent) -> Result<(), PipelineError> {
        let processed = self.process(event).await?;

        let receipt = self
            .chain
            .submit_response(&processed.request_id, &processed.encoded_data)
            .await?;

        info!(
            request_id = %processed.request_id,
            success = processed.success,
            tx_hash = %receipt.tx_hash,
            block = receipt.block_number,
            gas_used = receipt.gas_used,
            "Oracle request fulfilled"
        );
        Ok(())
    }
}
