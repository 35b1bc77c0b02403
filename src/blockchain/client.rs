// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain access for the oracle bridge.
//!
//! [`OracleChain`] is the seam between the bridge and the EVM: block height,
//! request logs, the published encryption key and fulfillment submission.
//! [`AlloyOracleChain`] implements it over JSON-RPC.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::{
    eips::BlockNumberOrTag,
    network::{Ethereum, EthereumWallet},
    primitives::{Address, Bytes, B256, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::{Filter, TransactionRequest},
    signers::local::PrivateKeySigner,
    sol_types::{SolCall, SolEvent},
};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::contract::{decode_request_log, IOracle};
use super::fees::{fee_params, DEFAULT_GAS_LIMIT};
use crate::crypto::{KeyDerivation, KEY_PATH, KEY_SUBJECT};
use crate::models::RequestEvent;

/// Receipt wait used when none is configured.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP provider type (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Errors that can occur during chain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid request id: {0}")]
    InvalidRequestId(String),

    #[error("Signing key unavailable: {0}")]
    Signing(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Could not decode request event: {0}")]
    Decode(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Transaction {tx_hash} not confirmed within {seconds} seconds")]
    ConfirmationTimeout { tx_hash: String, seconds: u64 },

    #[error("Transaction {0} reverted")]
    Reverted(String),
}

/// Confirmed fulfillment transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Chain operations needed by the bridge.
#[async_trait]
pub trait OracleChain: Send + Sync {
    /// Current block height.
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// `RestApiRequest` events in `from_block..=to_block`.
    ///
    /// The outer error means the range could not be read. Inner errors are
    /// logs that could not be decoded; they do not affect their neighbours.
    async fn request_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Result<RequestEvent, ChainError>>, ChainError>;

    /// Encryption key published by the oracle contract.
    async fn published_public_key(&self) -> Result<String, ChainError>;

    /// Submit `fulfillRequest(requestId, response)` and wait for the receipt.
    async fn submit_response(
        &self,
        request_id: &str,
        response: &[u8],
    ) -> Result<SubmissionReceipt, ChainError>;
}

/// [`OracleChain`] over an HTTP JSON-RPC endpoint.
pub struct AlloyOracleChain {
    rpc_url: url::Url,
    oracle_address: Address,
    provider: HttpProvider,
    signing_keys: Arc<dyn KeyDerivation>,
    gas_limit: u64,
    confirmation_timeout: Duration,
}

impl AlloyOracleChain {
    /// Bind to the chain endpoint and the oracle contract.
    ///
    /// `signing_keys` is asked for the submitter key on every submission.
    pub fn new(
        rpc_url: &str,
        oracle_address: &str,
        signing_keys: Arc<dyn KeyDerivation>,
    ) -> Result<Self, ChainError> {
        if rpc_url.trim().is_empty() {
            return Err(ChainError::InvalidRpcUrl("no provider URL configured".to_string()));
        }
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;
        let oracle_address = Address::from_str(oracle_address.trim())
            .map_err(|e| ChainError::InvalidAddress(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url.clone());

        Ok(Self {
            rpc_url: url,
            oracle_address,
            provider,
            signing_keys,
            gas_limit: DEFAULT_GAS_LIMIT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        })
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn oracle_address(&self) -> Address {
        self.oracle_address
    }

    /// Base fee of the latest block, or the node's gas price before EIP-1559.
    async fn base_fee(&self) -> Result<u128, ChainError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| ChainError::Rpc(format!("Failed to get block: {e}")))?;

        if let Some(base_fee) = block.and_then(|b| b.header.base_fee_per_gas) {
            return Ok(u128::from(base_fee));
        }

        debug!("Latest block has no base fee, falling back to gas price");
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| ChainError::Rpc(format!("Failed to get gas price: {e}")))
    }

    async fn signer(&self) -> Result<PrivateKeySigner, ChainError> {
        let secret = self
            .signing_keys
            .derive_key(KEY_PATH, KEY_SUBJECT)
            .await
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        PrivateKeySigner::from_slice(&secret).map_err(|e| ChainError::Signing(e.to_string()))
    }
}

#[async_trait]
impl OracleChain for AlloyOracleChain {
    async fn block_number(&self) -> Result<u64, ChainError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    async fn request_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Result<RequestEvent, ChainError>>, ChainError> {
        let filter = Filter::new()
            .address(self.oracle_address)
            .event_signature(IOracle::RestApiRequest::SIGNATURE_HASH)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        Ok(logs.iter().map(decode_request_log).collect())
    }

    async fn published_public_key(&self) -> Result<String, ChainError> {
        let contract = IOracle::new(self.oracle_address, self.provider.clone());
        contract
            .getPublicKey()
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    async fn submit_response(
        &self,
        request_id: &str,
        response: &[u8],
    ) -> Result<SubmissionReceipt, ChainError> {
        let id = B256::from_str(request_id)
            .map_err(|e| ChainError::InvalidRequestId(e.to_string()))?;

        let signer = self.signer().await?;
        let from = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(self.rpc_url.clone());

        let fees = fee_params(self.base_fee().await?);
        let call = IOracle::fulfillRequestCall {
            requestId: id,
            response: Bytes::copy_from_slice(response),
        };

        let tx = TransactionRequest::default()
            .from(from)
            .to(self.oracle_address)
            .input(call.abi_encode().into())
            .value(U256::ZERO)
            .gas_limit(self.gas_limit)
            .max_fee_per_gas(fees.max_fee_per_gas)
            .max_priority_fee_per_gas(fees.max_priority_fee_per_gas);

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::TransactionFailed(format!("Failed to send: {e}")))?;
        let tx_hash = format!("{:#x}", pending.tx_hash());
        info!(request_id, tx_hash = %tx_hash, "Fulfillment transaction sent");

        let receipt = tokio::time::timeout(self.confirmation_timeout, pending.get_receipt())
            .await
            .map_err(|_| ChainError::ConfirmationTimeout {
                tx_hash: tx_hash.clone(),
                seconds: self.confirmation_timeout.as_secs(),
            })?
            .map_err(|e| ChainError::TransactionFailed(format!("Failed to get receipt: {e}")))?;

        if !receipt.status() {
            warn!(request_id, tx_hash = %tx_hash, "Fulfillment transaction reverted");
            return Err(ChainError::Reverted(tx_hash));
        }

        Ok(SubmissionReceipt {
            tx_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            gas_used: receipt.gas_used as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::StaticKeyProvider;

    fn keys() -> Arc<dyn KeyDerivation> {
        Arc::new(StaticKeyProvider::new([7u8; 32]))
    }

    #[test]
    fn rejects_missing_provider() {
        let result = AlloyOracleChain::new(
            "  ",
            "0x00000000000000000000000000000000000000aa",
            keys(),
        );
        assert!(matches!(result, Err(ChainError::InvalidRpcUrl(_))));
    }

    #[test]
    fn rejects_invalid_oracle_address() {
        let result = AlloyOracleChain::new("http://localhost:8545", "0x1234", keys());
        assert!(matches!(result, Err(ChainError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn binds_to_endpoint_and_contract() {
        let chain = AlloyOracleChain::new(
            "http://localhost:8545",
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23",
            keys(),
        )
        .unwrap()
        .with_gas_limit(250_000);

        assert_eq!(
            chain.oracle_address().to_checksum(None),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        );
        assert_eq!(chain.gas_limit, 250_000);
    }

    #[tokio::test]
    async fn invalid_request_id_fails_before_signing() {
        let chain = AlloyOracleChain::new(
            "http://localhost:8545",
            "0x00000000000000000000000000000000000000aa",
            keys(),
        )
        .unwrap();

        let result = chain.submit_response("not-an-id", b"payload").await;
        assert!(matches!(result, Err(ChainError::InvalidRequestId(_))));
    }
}
