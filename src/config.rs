// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Every setting can be given as a CLI flag or an environment variable.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `WEB3_PROVIDER` | EVM JSON-RPC endpoint | `http://localhost:8545` |
//! | `ORACLE_ADDRESS` | Oracle contract address | Required |
//! | `POLL_INTERVAL` | Seconds between poll cycles | `5` |
//! | `API_TIMEOUT` | Seconds per external API call | `30` |
//! | `LOG_LEVEL` | Log level when `RUST_LOG` is unset | `info` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `PRIVATE_KEY` | Signing key override (hex) for hosts without dstack | None |
//! | `ORACLE_PUBLIC_KEY` | Encryption key to pin (hex) | None |
//! | `DSTACK_SIMULATOR_ENDPOINT` | dstack tappd endpoint | `http://localhost:8090` |
//! | `HOST` | Control-plane bind address | `0.0.0.0` |
//! | `PORT` | Control-plane bind port | `3000` |
//! | `GAS_LIMIT` | Gas limit of fulfillment transactions | `500000` |
//! | `CONFIRMATION_TIMEOUT` | Seconds to wait for a receipt | `60` |
//! | `FLOAT_DECIMALS` | Fixed-point scale of non-integral numbers | `18` |

use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use clap::{Parser, ValueEnum};

use crate::crypto::DEFAULT_DSTACK_ENDPOINT;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No chain provider URL configured")]
    MissingProvider,

    #[error("Invalid chain provider URL '{url}': {reason}")]
    InvalidProvider { url: String, reason: String },

    #[error("No oracle contract address configured")]
    MissingOracleAddress,

    #[error("Invalid oracle contract address '{0}'")]
    InvalidOracleAddress(String),

    #[error("Invalid signing key override: {0}")]
    InvalidPrivateKey(String),

    #[error("Poll interval must be greater than zero")]
    InvalidPollInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// TEE oracle bridge.
#[derive(Debug, Clone, Parser)]
#[command(name = "tee-oracle", version, about)]
pub struct OracleConfig {
    /// EVM JSON-RPC endpoint.
    #[arg(long = "provider", env = "WEB3_PROVIDER", default_value = "http://localhost:8545")]
    pub provider_url: String,

    /// Oracle contract address.
    #[arg(long, env = "ORACLE_ADDRESS", default_value = "")]
    pub oracle_address: String,

    /// Seconds between poll cycles.
    #[arg(long, env = "POLL_INTERVAL", default_value_t = 5.0)]
    pub poll_interval: f64,

    /// Seconds per external API call.
    #[arg(long, env = "API_TIMEOUT", default_value_t = 30)]
    pub api_timeout: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Signing key override (hex). Decryption still uses the enclave key.
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Public key to pin for encryption (hex).
    #[arg(long, env = "ORACLE_PUBLIC_KEY")]
    pub public_key: Option<String>,

    #[arg(long, env = "DSTACK_SIMULATOR_ENDPOINT", default_value = DEFAULT_DSTACK_ENDPOINT)]
    pub dstack_endpoint: String,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "GAS_LIMIT", default_value_t = 500_000)]
    pub gas_limit: u64,

    /// Seconds to wait for a fulfillment receipt.
    #[arg(long, env = "CONFIRMATION_TIMEOUT", default_value_t = 60)]
    pub confirmation_timeout: u64,

    /// Decimal places kept when encoding non-integral numbers.
    #[arg(long, env = "FLOAT_DECIMALS", default_value_t = 18)]
    pub float_decimals: u8,
}

impl OracleConfig {
    /// Check the settings the bridge cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = self.provider_url.trim();
        if provider.is_empty() {
            return Err(ConfigError::MissingProvider);
        }
        url::Url::parse(provider).map_err(|e| ConfigError::InvalidProvider {
            url: provider.to_string(),
            reason: e.to_string(),
        })?;

        let address = self.oracle_address.trim();
        if address.is_empty() {
            return Err(ConfigError::MissingOracleAddress);
        }
        Address::from_str(address)
            .map_err(|_| ConfigError::InvalidOracleAddress(address.to_string()))?;

        if let Some(key) = &self.private_key {
            let bytes = alloy::hex::decode(key.trim())
                .map_err(|e| ConfigError::InvalidPrivateKey(e.to_string()))?;
            if bytes.len() != 32 {
                return Err(ConfigError::InvalidPrivateKey(format!(
                    "expected 32 bytes, got {}",
                    bytes.len()
                )));
            }
        }

        if !(self.poll_interval.is_finite() && self.poll_interval > 0.0) {
            return Err(ConfigError::InvalidPollInterval);
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout)
    }

    /// Control-plane bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Filter used when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> String {
        format!("{},tower_http=debug", self.log_level.to_ascii_lowercase())
    }
}
