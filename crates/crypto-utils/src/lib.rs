//! # crypto-utils
//!
//! At-rest protection for wallet fields: an Argon2id key schedule keyed by
//! the application passphrase and an AES-256-GCM envelope that travels as hex.

pub mod encryption;
pub mod error;
pub mod kdf;

pub use encryption::AppKey;
pub use error::CryptoError;
pub use kdf::KdfParams;
