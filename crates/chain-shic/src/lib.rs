//! Shibacoin (SHIC) chain support for the wallet.
//!
//! Provides legacy P2PKH address and WIF codecs with Shibacoin version bytes,
//! minor-unit amount conversion, and a single-input PSBT pipeline: build,
//! sign, verify, finalize, and serialize for broadcast.

pub mod address;
pub mod amount;
pub mod error;
pub mod network;
pub mod transaction;
pub mod utxo;
pub mod wif;

pub use error::ShicError;
