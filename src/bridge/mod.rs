// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Chain Bridge
//!
//! Watches the oracle contract for `RestApiRequest` events and hands each one
//! to a [`RequestHandler`].
//!
//! ## Cursor
//!
//! The bridge keeps the last processed block height in memory. On first use
//! the cursor starts at the current chain height, so requests emitted before
//! startup are not replayed. Each cycle processes `(cursor, height]` and then
//! moves the cursor to `height`, whether or not every event succeeded:
//! delivery is at-most-once. Failures are reported in the [`PollReport`] and
//! to the optional [`FailureHook`].
//!
//! A cycle that cannot read the height or the logs does not move the cursor.
//!
//! ## Shutdown
//!
//! [`ChainBridge::run`] stops between cycles when its `CancellationToken` is
//! triggered; an event already in flight is finished first.

pub mod pipeline;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::blockchain::{ChainError, OracleChain};
use crate::crypto::CryptoService;
use crate::models::RequestEvent;

pub use pipeline::{OraclePipeline, PipelineError};

/// Interval between poll cycles when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Processes one decoded request event end to end.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, event: &RequestEvent) -> Result<(), PipelineError>;
}

#[async_trait]
impl<T: RequestHandler + ?Sized> RequestHandler for Arc<T> {
    async fn handle(&self, event: &RequestEvent) -> Result<(), PipelineError> {
        (**self).handle(event).await
    }
}

/// An event that could not be processed in a poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEvent {
    /// `None` when the log itself could not be decoded.
    pub request_id: Option<String>,
    pub block_number: Option<u64>,
    pub error: String,
}

/// Called once per failed event. Extension point for retry policies.
pub trait FailureHook: Send + Sync {
    fn on_failure(&self, failure: &FailedEvent);
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Block range scanned, `None` when the chain had not advanced.
    pub range: Option<(u64, u64)>,
    pub processed: usize,
    pub failed: Vec<FailedEvent>,
    /// Cursor after the cycle.
    pub cursor: u64,
}

impl PollReport {
    pub fn events_seen(&self) -> usize {
        self.processed + self.failed.len()
    }
}

/// Poll-driven bridge between the oracle contract and a request handler.
pub struct ChainBridge<C, H> {
    chain: Arc<C>,
    crypto: Arc<CryptoService>,
    handler: H,
    cursor: Option<u64>,
    failure_hook: Option<Box<dyn FailureHook>>,
}

impl<C: OracleChain, H: RequestHandler> ChainBridge<C, H> {
    pub fn new(chain: Arc<C>, crypto: Arc<CryptoService>, handler: H) -> Self {
        Self {
            chain,
            crypto,
            handler,
            cursor: None,
            failure_hook: None,
        }
    }

    pub fn with_failure_hook(mut self, hook: impl FailureHook + 'static) -> Self {
        self.failure_hook = Some(Box::new(hook));
        self
    }

    /// Last processed block, `None` before initialization.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Set the cursor to the current height and check the published key.
    ///
    /// A key mismatch is logged, not fatal: requesters encrypting to the
    /// published key would produce fields this process cannot decrypt.
    pub async fn initialize(&mut self) -> Result<u64, ChainError> {
        let height = self.chain.block_number().await?;
        self.cursor = Some(height);
        info!(block = height, "Chain bridge initialized");

        match self.chain.published_public_key().await {
            Ok(published) if published.trim().is_empty() => {
                warn!("Oracle contract has no public key published");
            }
            Ok(published) if self.crypto.matches_public_key(&published) => {
                info!("Oracle public key matches the contract");
            }
            Ok(published) => {
                error!(
                    published = %published,
                    local = %self.crypto.public_key_hex().unwrap_or_default(),
                    "Oracle public key does not match the contract; encrypted requests will fail"
                );
            }
            Err(e) => {
                error!(error = %e, "Could not retrieve oracle public key from the contract");
            }
        }

        Ok(height)
    }

    /// Run one poll cycle.
    pub async fn poll_once(&mut self) -> Result<PollReport, ChainError> {
        let cursor = match self.cursor {
            Some(cursor) => cursor,
            None => self.initialize().await?,
        };

        let height = self.chain.block_number().await?;
        if height <= cursor {
            debug!(block = height, "No new blocks");
            return Ok(PollReport {
                cursor,
                ..Default::default()
            });
        }

        let from_block = cursor + 1;
        let decoded = self.chain.request_events(from_block, height).await?;

        let mut failed = Vec::new();
        let mut events = Vec::with_capacity(decoded.len());
        for entry in decoded {
            match entry {
                Ok(event) => events.push(event),
                Err(e) => {
                    error!(error = %e, from_block, to_block = height, "Skipping undecodable request log");
                    failed.push(FailedEvent {
                        request_id: None,
                        block_number: None,
                        error: e.to_string(),
                    });
                }
            }
        }
        events.sort_by_key(|event| (event.block_number, event.log_index));

        if !events.is_empty() {
            info!(count = events.len(), from_block, to_block = height, "Found oracle requests");
        }

        let mut processed = 0;
        for event in &events {
            info!(
                request_id = %event.request_id,
                requester = %event.requester,
                block = event.block_number,
                "Processing oracle request"
            );
            match self.handler.handle(event).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    error!(request_id = %event.request_id, error = %e, "Failed to process oracle request");
                    failed.push(FailedEvent {
                        request_id: Some(event.request_id.clone()),
                        block_number: Some(event.block_number),
                        error: e.to_string(),
                    });
                }
            }
        }

        if let Some(hook) = &self.failure_hook {
            for failure in &failed {
                hook.on_failure(failure);
            }
        }

        self.cursor = Some(height);

        Ok(PollReport {
            range: Some((from_block, height)),
            processed,
            failed,
            cursor: height,
        })
    }

    /// Poll until `shutdown` is triggered.
    ///
    /// A failed cycle waits twice the poll interval before the next one.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(bridge.run(poll_interval, shutdown.clone()));
    /// ```
    pub async fn run(mut self, poll_interval: Duration, shutdown: CancellationToken) {
        info!(interval_secs = poll_interval.as_secs_f64(), "Chain bridge starting");

        loop {
            if shutdown.is_cancelled() {
                info!("Chain bridge shutting down");
                return;
            }

            let delay = match self.poll_once().await {
                Ok(report) => {
                    if !report.failed.is_empty() {
                        warn!(
                            processed = report.processed,
                            failed = report.failed.len(),
                            cursor = report.cursor,
                            "Poll cycle finished with failures"
                        );
                    }
                    poll_interval
                }
                Err(e) => {
                    warn!(error = %e, "Poll cycle failed");
                    poll_interval * 2
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = shutdown.cancelled() => {
                    info!("Chain bridge shutting down");
                    return;
                }
            }
        }
    }
}
