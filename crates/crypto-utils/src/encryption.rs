use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// AES-256-GCM nonce size in bytes.
const NONCE_SIZE: usize = 12;

/// GCM authentication tag size in bytes.
const TAG_SIZE: usize = 16;

/// 32-byte symmetric key protecting stored wallet fields.
///
/// Wiped from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AppKey([u8; 32]);

impl AppKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for AppKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AppKey(..)")
    }
}

/// Seals `plaintext` under `key`.
///
/// Output layout: `[nonce (12 bytes) | ciphertext | tag (16 bytes)]`. A fresh
/// random nonce is drawn per call, so sealing the same value twice yields
/// different envelopes.
pub fn seal(plaintext: &[u8], key: &AppKey) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut envelope = Vec::with_capacity(NONCE_SIZE + sealed.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&sealed);
    Ok(envelope)
}

/// Opens an envelope produced by [`seal`].
pub fn open(envelope: &[u8], key: &AppKey) -> Result<Vec<u8>, CryptoError> {
    if envelope.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::InvalidInput(format!(
            "envelope too short: expected at least {} bytes, got {}",
            NONCE_SIZE + TAG_SIZE,
            envelope.len()
        )));
    }

    let (nonce_bytes, sealed) = envelope.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), sealed)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// Seals a UTF-8 field value and hex-encodes the envelope for storage.
pub fn seal_hex(value: &str, key: &AppKey) -> Result<String, CryptoError> {
    seal(value.as_bytes(), key).map(hex::encode)
}

/// Reverses [`seal_hex`]. Bad hex, a failed tag check, and non-UTF-8
/// plaintext are all errors.
pub fn open_hex(stored: &str, key: &AppKey) -> Result<String, CryptoError> {
    let envelope =
        hex::decode(stored.trim()).map_err(|e| CryptoError::Encoding(format!("hex: {e}")))?;
    let plaintext = open(&envelope, key)?;
    String::from_utf8(plaintext).map_err(|e| CryptoError::Encoding(format!("utf-8: {e}")))
}
