// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ECIES over secp256k1.
//!
//! Wire format (compatible with `eciespy`):
//! `ephemeral_pubkey (65, uncompressed) || nonce (16) || tag (16) || ciphertext`
//!
//! The symmetric key is HKDF-SHA256 over `ephemeral_pubkey || shared_point`
//! (both uncompressed) with no salt and empty info; the cipher is AES-256-GCM
//! with a 16-byte nonce.

use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray, AeadCore, AeadInPlace, KeyInit, OsRng},
    aes::Aes256,
    AesGcm,
};
use hkdf::Hkdf;
use k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use sha2::Sha256;

use super::CryptoError;

type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Size of an uncompressed secp256k1 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 65;

/// Size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 16;

/// Size of the AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

const HEADER_SIZE: usize = PUBLIC_KEY_SIZE + NONCE_SIZE + TAG_SIZE;

/// Encrypt `plaintext` to `recipient`.
pub fn encrypt(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = SecretKey::random(&mut OsRng);
    let ephemeral_public = ephemeral.public_key();

    let shared = shared_point(&ephemeral, recipient)?;
    let key = derive_symmetric_key(&ephemeral_public, &shared)?;

    let cipher = Aes256Gcm16::new_from_slice(&key)
        .map_err(|e| CryptoError::Encryption(format!("cipher init failed: {e}")))?;
    let nonce = Aes256Gcm16::generate_nonce(&mut OsRng);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, b"", &mut buffer)
        .map_err(|e| CryptoError::Encryption(format!("encryption failed: {e}")))?;

    let mut output = Vec::with_capacity(HEADER_SIZE + buffer.len());
    output.extend_from_slice(ephemeral_public.to_encoded_point(false).as_bytes());
    output.extend_from_slice(nonce.as_slice());
    output.extend_from_slice(tag.as_slice());
    output.extend_from_slice(&buffer);

    Ok(output)
}

/// Decrypt an ECIES payload with `secret`.
pub fn decrypt(secret: &SecretKey, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if payload.len() < HEADER_SIZE {
        return Err(CryptoError::Decryption(format!(
            "ciphertext too short: {} < {HEADER_SIZE}",
            payload.len()
        )));
    }

    let (ephemeral_bytes, rest) = payload.split_at(PUBLIC_KEY_SIZE);
    let (nonce_bytes, rest) = rest.split_at(NONCE_SIZE);
    let (tag_bytes, encrypted) = rest.split_at(TAG_SIZE);

    let ephemeral_public = PublicKey::from_sec1_bytes(ephemeral_bytes)
        .map_err(|_| CryptoError::Decryption("invalid ephemeral public key".to_string()))?;

    let shared = shared_point(secret, &ephemeral_public)?;
    let key = derive_symmetric_key(&ephemeral_public, &shared)?;

    let cipher = Aes256Gcm16::new_from_slice(&key)
        .map_err(|e| CryptoError::Decryption(format!("cipher init failed: {e}")))?;

    let mut buffer = encrypted.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce_bytes),
            b"",
            &mut buffer,
            GenericArray::from_slice(tag_bytes),
        )
        .map_err(|_| CryptoError::Decryption("authentication failed".to_string()))?;

    Ok(buffer)
}

/// Parse a hex public key: `0x` optional, 64-byte raw, 65-byte uncompressed
/// or 33-byte compressed.
pub fn parse_public_key(hex_key: &str) -> Result<PublicKey, CryptoError> {
    let trimmed = hex_key.trim();
    let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let mut bytes = alloy::hex::decode(stripped)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

    if bytes.len() == 64 {
        bytes.insert(0, 0x04);
    }

    PublicKey::from_sec1_bytes(&bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Uncompressed `0x04…` hex of a public key.
pub fn public_key_hex(public: &PublicKey) -> String {
    format!(
        "0x{}",
        alloy::hex::encode(public.to_encoded_point(false).as_bytes())
    )
}

/// ECDH producing the full shared point rather than only its x-coordinate.
fn shared_point(secret: &SecretKey, public: &PublicKey) -> Result<PublicKey, CryptoError> {
    let point = (public.to_projective() * *secret.to_nonzero_scalar()).to_affine();
    PublicKey::from_affine(point)
        .map_err(|_| CryptoError::Decryption("shared point is the identity".to_string()))
}

fn derive_symmetric_key(
    ephemeral_public: &PublicKey,
    shared: &PublicKey,
) -> Result<[u8; 32], CryptoError> {
    let mut ikm = Vec::with_capacity(PUBLIC_KEY_SIZE * 2);
    ikm.extend_from_slice(ephemeral_public.to_encoded_point(false).as_bytes());
    ikm.extend_from_slice(shared.to_encoded_point(false).as_bytes());

    let hk = Hkdf::<Sha256>::new(None, &ikm);
    let mut key = [0u8; 32];
    hk.expand(&[], &mut key)
        .map_err(|_| CryptoError::Decryption("HKDF expansion failed".to_string()))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> (SecretKey, PublicKey) {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        (secret, public)
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let (secret, public) = keypair();
        let plaintext = "https://api.example.com/v1/price?key=s3cr3t";

        let payload = encrypt(&public, plaintext.as_bytes()).unwrap();
        assert_eq!(payload.len(), HEADER_SIZE + plaintext.len());
        assert_eq!(payload[0], 0x04);

        let decrypted = decrypt(&secret, &payload).unwrap();
        assert_eq!(decrypted, plaintext.as_bytes());
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let (secret, public) = keypair();
        let payload = encrypt(&public, b"").unwrap();
        assert_eq!(decrypt(&secret, &payload).unwrap(), b"");
    }

    #[test]
    fn ciphertexts_are_randomized() {
        let (_, public) = keypair();
        let a = encrypt(&public, b"same").unwrap();
        let b = encrypt(&public, b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let (_, public) = keypair();
        let (other, _) = keypair();
        let payload = encrypt(&public, b"secret").unwrap();
        assert!(matches!(
            decrypt(&other, &payload),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let (secret, public) = keypair();
        let mut payload = encrypt(&public, b"important").unwrap();
        let last = payload.len() - 1;
        payload[last] ^= 0xff;
        assert!(decrypt(&secret, &payload).is_err());
    }

    #[test]
    fn short_payload_fails() {
        let (secret, _) = keypair();
        assert!(decrypt(&secret, &[0u8; HEADER_SIZE - 1]).is_err());
    }

    #[test]
    fn parse_public_key_accepts_all_encodings() {
        let (_, public) = keypair();
        let uncompressed = public.to_encoded_point(false);
        let compressed = public.to_encoded_point(true);

        let with_prefix = public_key_hex(&public);
        let raw = alloy::hex::encode(&uncompressed.as_bytes()[1..]);
        let short = alloy::hex::encode(compressed.as_bytes());

        assert_eq!(parse_public_key(&with_prefix).unwrap(), public);
        assert_eq!(parse_public_key(&raw).unwrap(), public);
        assert_eq!(parse_public_key(&format!("0x{raw}")).unwrap(), public);
        assert_eq!(parse_public_key(&short).unwrap(), public);
        assert!(parse_public_key("0xdeadbeef").is_err());
    }
}
