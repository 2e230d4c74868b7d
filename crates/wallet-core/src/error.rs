use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Amount must exceed the network fee of {fee} minor units")]
    AmountBelowFee { fee: u64 },

    #[error("Amount not representable: {0}")]
    AmountPrecisionError(String),

    #[error("Password does not match")]
    PasswordMismatch,

    #[error("Not sufficient funds. Available: {available} minor units")]
    InsufficientFunds { available: u64 },

    #[error("Invalid account name: {0}")]
    InvalidAccountName(String),

    #[error("No account at index {0}")]
    AccountNotFound(usize),

    #[error("No unspent output available: {0}")]
    UtxoUnavailable(String),

    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("Transaction build failed: {0}")]
    TransactionFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Broadcast rejected: {0}")]
    BroadcastRejected(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<crypto_utils::CryptoError> for WalletError {
    fn from(e: crypto_utils::CryptoError) -> Self {
        WalletError::EncryptionFailed(e.to_string())
    }
}

impl From<chain_shic::ShicError> for WalletError {
    fn from(e: chain_shic::ShicError) -> Self {
        use chain_shic::ShicError;
        match e {
            ShicError::InvalidAddress(msg) => WalletError::InvalidDestination(msg),
            ShicError::AmountPrecision(msg) => WalletError::AmountPrecisionError(msg),
            ShicError::UtxoUnavailable(msg) => WalletError::UtxoUnavailable(msg),
            ShicError::SignatureInvalid(msg) => WalletError::SignatureInvalid(msg),
            ShicError::InvalidPrivateKey(msg)
            | ShicError::InvalidPublicKey(msg)
            | ShicError::InvalidWif(msg) => WalletError::DerivationFailed(msg),
            other => WalletError::TransactionFailed(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(e: reqwest::Error) -> Self {
        WalletError::NetworkError(e.to_string())
    }
}
