//! Wallet configuration loaded from environment variables.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chain_shic::network::{BLOCKBOOK_URL, ELECTRUM_URL, EXPLORER_URL, FIXED_FEE_SAT};
use chain_shic::transaction::ChangePolicy;
use crypto_utils::kdf::{derive_app_key, KdfParams};

use crate::error::WalletError;
use crate::store::{EncryptedStore, FileBackend};

/// Application passphrase used when none is configured.
pub const DEFAULT_APP_PASSPHRASE: &str = "encryption_key";

#[derive(Clone, Debug)]
pub struct WalletConfig {
    /// Blockbook base URL (balances).
    pub blockbook_url: String,
    /// Explorer base URL (price, transaction pages).
    pub explorer_url: String,
    /// Electrum-style REST base URL (unspent, raw tx, broadcast).
    pub electrum_url: String,
    /// Encrypted store file.
    pub store_path: PathBuf,
    /// Passphrase the store key is derived from. Not the user's password.
    pub app_passphrase: String,
    /// Default tracing filter.
    pub log_level: String,
    pub http_timeout: Duration,
    /// Flat fee per send, minor units.
    pub fee_sat: u64,
    pub change_policy: ChangePolicy,
    pub kdf: KdfParams,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            blockbook_url: BLOCKBOOK_URL.to_string(),
            explorer_url: EXPLORER_URL.to_string(),
            electrum_url: ELECTRUM_URL.to_string(),
            store_path: default_store_path(),
            app_passphrase: DEFAULT_APP_PASSPHRASE.to_string(),
            log_level: "info".to_string(),
            http_timeout: Duration::from_secs(30),
            fee_sat: FIXED_FEE_SAT,
            change_policy: ChangePolicy::DonateToFee,
            kdf: KdfParams::default(),
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shic-wallet")
        .join("store.json")
}

impl WalletConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, WalletError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`WalletConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WalletError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("SHIC_BLOCKBOOK_URL") {
            config.blockbook_url = url;
        }
        if let Some(url) = lookup("SHIC_EXPLORER_URL") {
            config.explorer_url = url;
        }
        if let Some(url) = lookup("SHIC_ELECTRUM_URL") {
            config.electrum_url = url;
        }
        if let Some(path) = lookup("SHIC_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(passphrase) = lookup("SHIC_APP_PASSPHRASE") {
            config.app_passphrase = passphrase;
        }
        if let Some(level) = lookup("SHIC_LOG") {
            config.log_level = level;
        }
        if let Some(raw) = lookup("SHIC_HTTP_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                WalletError::Config(format!(
                    "SHIC_HTTP_TIMEOUT_SECS must be a positive integer, got {raw:?}"
                ))
            })?;
            if secs == 0 {
                return Err(WalletError::Config(
                    "SHIC_HTTP_TIMEOUT_SECS must be greater than zero".into(),
                ));
            }
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("SHIC_CHANGE_POLICY") {
            config.change_policy = match raw.trim() {
                "donate" => ChangePolicy::DonateToFee,
                "return" => ChangePolicy::ReturnToSender,
                other => {
                    return Err(WalletError::Config(format!(
                        "SHIC_CHANGE_POLICY must be \"donate\" or \"return\", got {other:?}"
                    )))
                }
            };
        }

        Ok(config)
    }

    /// Open the encrypted file store described by this config.
    ///
    /// Runs the KDF, so call it once per process.
    pub fn open_store(&self) -> Result<EncryptedStore, WalletError> {
        let key = derive_app_key(&self.app_passphrase, self.kdf)?;
        EncryptedStore::open(Arc::new(FileBackend::new(&self.store_path)), key)
    }
}
