// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tee_oracle::{
    api::router,
    blockchain::{AlloyOracleChain, ChainError},
    bridge::{ChainBridge, OraclePipeline},
    config::{ConfigError, LogFormat, OracleConfig},
    crypto::{CryptoError, CryptoService, DstackKeyProvider, KeyDerivation, StaticKeyProvider},
    fetch::{ApiClient, FetchError},
    processing::OnChainEncoder,
    state::AppState,
};

#[derive(Debug, thiserror::Error)]
enum BootError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Control plane failed: {0}")]
    Server(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = OracleConfig::parse();
    init_tracing(&config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "TEE oracle stopped");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &OracleConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_log_filter()));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_ansi(false)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn run(config: OracleConfig) -> Result<(), BootError> {
    config.validate()?;

    // Decryption always uses the enclave key. The override only replaces the
    // signing key, for hosts without enclave access.
    let enclave = Arc::new(DstackKeyProvider::new(config.dstack_endpoint.clone())?);
    let crypto = Arc::new(CryptoService::new());
    crypto.initialize(enclave.as_ref()).await?;
    if let Some(public_key) = &config.public_key {
        crypto.set_public_key(public_key)?;
    }

    let signing_keys: Arc<dyn KeyDerivation> = match &config.private_key {
        Some(key) => {
            warn!("Using signing key override instead of the enclave-derived key");
            Arc::new(StaticKeyProvider::from_hex(key)?)
        }
        None => enclave,
    };

    let chain = Arc::new(
        AlloyOracleChain::new(&config.provider_url, &config.oracle_address, signing_keys)?
            .with_gas_limit(config.gas_limit)
            .with_confirmation_timeout(config.confirmation_timeout()),
    );
    info!(
        provider = %config.provider_url,
        oracle = %chain.oracle_address(),
        "Connected to oracle contract"
    );

    let api = ApiClient::new(crypto.clone(), config.api_timeout())?;
    let pipeline = OraclePipeline::new(
        api,
        crypto.clone(),
        OnChainEncoder::new(config.float_decimals),
        chain.clone(),
    );
    let bridge = ChainBridge::new(chain, crypto.clone(), pipeline);

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!(address = %listener.local_addr()?, "Control plane listening (docs at /docs)");

    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router(AppState::new(crypto)))
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    bridge.run(config.poll_interval(), shutdown.clone()).await;

    match server.await {
        Ok(result) => result?,
        Err(e) => error!(error = %e, "Control plane task failed"),
    }

    info!("TEE oracle stopped");
    Ok(())
}

async fn watch_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Could not install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down gracefully"),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
    shutdown.cancel();
}
