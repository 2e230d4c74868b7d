use thiserror::Error;

/// Errors from the store key schedule and the field envelope.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("key derivation failed: {0}")]
    KdfFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}
