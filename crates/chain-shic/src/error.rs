use thiserror::Error;

/// Shibacoin chain operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShicError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid WIF: {0}")]
    InvalidWif(String),

    #[error("amount not representable in minor units: {0}")]
    AmountPrecision(String),

    #[error("unspent output unavailable: {0}")]
    UtxoUnavailable(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("finalize error: {0}")]
    FinalizeError(String),
}
