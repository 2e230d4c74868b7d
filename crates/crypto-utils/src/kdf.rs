use argon2::{Algorithm, Argon2, Params, Version};

use crate::encryption::AppKey;
use crate::error::CryptoError;

/// Fixed salt for the application store key.
///
/// The store key must be reproducible from the passphrase alone, so the salt
/// is a constant rather than a stored random value.
pub const APP_SALT: [u8; 16] = *b"shic-wallet/v1\0\0";

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// 64 MiB, 3 passes, 4 lanes.
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests and throwaway in-memory stores.
    pub fn fast() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Derives a 32-byte key from `password` and `salt` using Argon2id.
pub fn derive_key(
    password: &[u8],
    salt: &[u8; 16],
    params: KdfParams,
) -> Result<[u8; 32], CryptoError> {
    let params = Params::new(params.memory_kib, params.iterations, params.parallelism, Some(32))
        .map_err(|e| CryptoError::KdfFailed(format!("invalid argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| CryptoError::KdfFailed(format!("argon2 hash failed: {e}")))?;

    Ok(output)
}

/// Derives the store key from the application passphrase.
///
/// Same passphrase, same key. Changing the passphrase orphans every field
/// written under the old one.
pub fn derive_app_key(passphrase: &str, params: KdfParams) -> Result<AppKey, CryptoError> {
    derive_key(passphrase.as_bytes(), &APP_SALT, params).map(AppKey::from_bytes)
}
