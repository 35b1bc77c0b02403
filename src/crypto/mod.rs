// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Confidential field codec.
//!
//! Requesters encrypt sensitive request fields (URLs, API keys, thresholds)
//! to the oracle's published public key. Only this process holds the
//! matching private key, derived from the enclave at startup.
//!
//! ## Lifecycle
//!
//! - **Uninitialized**: every operation fails with [`CryptoError::NotInitialized`]
//! - **Initialized**: key derived, address computed; encrypt + decrypt
//! - **Pinned**: public key set externally without a private key; encrypt only
//!
//! A single [`CryptoService`] is built in `main` and shared by handle with the
//! fetch client, the condition engine, the bridge and the control plane.

pub mod ecies;
pub mod keys;

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use alloy::primitives::Address;
use base64ct::{Base64, Encoding};
use k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use serde::Serialize;
use tracing::{info, warn};

pub use keys::{
    DstackKeyProvider, KeyDerivation, StaticKeyProvider, DEFAULT_DSTACK_ENDPOINT, KEY_PATH,
    KEY_SUBJECT,
};

/// Errors raised by the confidential field codec.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Crypto service not initialized")]
    NotInitialized,

    #[error("Private key not available")]
    PrivateKeyMissing,

    #[error("Public key not set")]
    PublicKeyMissing,

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid base64 ciphertext: {0}")]
    InvalidEncoding(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

#[derive(Default)]
struct KeyState {
    secret: Option<SecretKey>,
    public: Option<PublicKey>,
    initialized: bool,
}

/// Public view of the codec's key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyInfo {
    pub address: String,
    pub public_key: String,
    pub initialized: bool,
}

/// Process-wide codec state. Read-mostly; writes happen only at startup.
#[derive(Default)]
pub struct CryptoService {
    state: RwLock<KeyState>,
}

impl std::fmt::Debug for CryptoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("CryptoService")
            .field("initialized", &state.initialized)
            .field("has_private_key", &state.secret.is_some())
            .finish_non_exhaustive()
    }
}

impl CryptoService {
    /// Create an uninitialized service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an initialized service from raw secret bytes.
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, CryptoError> {
        let service = Self::new();
        service.initialize_with_secret(secret)?;
        Ok(service)
    }

    /// Derive the key from the enclave. No-op when already initialized.
    pub async fn initialize(&self, provider: &dyn KeyDerivation) -> Result<(), CryptoError> {
        if self.has_private_key() {
            return Ok(());
        }

        info!("Initializing crypto service with enclave-derived key");
        let secret = provider.derive_key(KEY_PATH, KEY_SUBJECT).await?;
        self.initialize_with_secret(&secret)
    }

    /// Install a secret key and derive the public key and address from it.
    pub fn initialize_with_secret(&self, secret: &[u8]) -> Result<(), CryptoError> {
        let secret = SecretKey::from_slice(secret)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        let public = secret.public_key();
        let address = address_of(&public);

        let mut state = self.write();
        state.secret = Some(secret);
        state.public = Some(public);
        state.initialized = true;

        info!(address = %address, "Crypto service initialized");
        Ok(())
    }

    /// Pin the public key used for encryption (hex, `0x` optional).
    ///
    /// Without a private key the service can encrypt but not decrypt.
    pub fn set_public_key(&self, public_key: &str) -> Result<(), CryptoError> {
        let public = ecies::parse_public_key(public_key)?;

        let mut state = self.write();
        if let Some(secret) = &state.secret {
            if secret.public_key() != public {
                warn!("Pinned public key does not match the derived private key");
            }
        }
        state.public = Some(public);
        state.initialized = true;

        info!("Public key set manually");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.read().initialized
    }

    pub fn has_private_key(&self) -> bool {
        self.read().secret.is_some()
    }

    /// Uncompressed `0x04…` public key, if known.
    pub fn public_key_hex(&self) -> Option<String> {
        self.read().public.as_ref().map(ecies::public_key_hex)
    }

    /// Checksummed Ethereum address of the private key, if present.
    pub fn address(&self) -> Option<String> {
        self.read()
            .secret
            .as_ref()
            .map(|s| address_of(&s.public_key()).to_checksum(None))
    }

    /// Key material summary for the control plane.
    pub fn key_info(&self) -> KeyInfo {
        let state = self.read();
        if !state.initialized {
            return KeyInfo {
                address: String::new(),
                public_key: String::new(),
                initialized: false,
            };
        }

        let derived_public = state.secret.as_ref().map(SecretKey::public_key);
        KeyInfo {
            address: derived_public
                .as_ref()
                .map(|p| address_of(p).to_checksum(None))
                .unwrap_or_default(),
            public_key: derived_public
                .as_ref()
                .map(ecies::public_key_hex)
                .unwrap_or_default(),
            initialized: true,
        }
    }

    /// Encrypt a string for use in an on-chain request. Returns base64.
    pub fn encrypt_for_chain(&self, plaintext: &str) -> Result<String, CryptoError> {
        let state = self.read();
        if !state.initialized {
            return Err(CryptoError::NotInitialized);
        }
        let public = state.public.as_ref().ok_or(CryptoError::PublicKeyMissing)?;

        let payload = ecies::encrypt(public, plaintext.as_bytes())?;
        Ok(Base64::encode_string(&payload))
    }

    /// Decrypt a base64 ciphertext produced for this oracle's key.
    pub fn decrypt_from_chain(&self, ciphertext_b64: &str) -> Result<String, CryptoError> {
        let state = self.read();
        if !state.initialized {
            return Err(CryptoError::NotInitialized);
        }
        let secret = state.secret.as_ref().ok_or(CryptoError::PrivateKeyMissing)?;

        let payload = Base64::decode_vec(ciphertext_b64.trim())
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        let plaintext = ecies::decrypt(secret, &payload)?;

        String::from_utf8(plaintext)
            .map_err(|e| CryptoError::Decryption(format!("plaintext is not UTF-8: {e}")))
    }

    /// Whether `published` (as stored on-chain) names this service's key.
    ///
    /// Comparison ignores case and the `0x` / `04` prefixes.
    pub fn matches_public_key(&self, published: &str) -> bool {
        match (self.read().public.as_ref(), ecies::parse_public_key(published)) {
            (Some(own), Ok(other)) => own.to_encoded_point(false) == other.to_encoded_point(false),
            _ => false,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, KeyState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, KeyState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn address_of(public: &PublicKey) -> Address {
    let encoded = public.to_encoded_point(false);
    Address::from_raw_public_key(&encoded.as_bytes()[1..])
}
