use bip39::{Language, Mnemonic};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::{Zeroize, Zeroizing};

use crate::error::WalletError;

/// Number of words in every phrase this wallet creates.
pub const WORD_COUNT: usize = 12;

/// Generate a new 12-word BIP-39 mnemonic (128 bits of entropy)
pub fn generate_mnemonic() -> Result<SecretString, WalletError> {
    let mut entropy = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()));
    entropy.zeroize();
    Ok(SecretString::from(mnemonic?.to_string()))
}

/// Validate a mnemonic phrase
pub fn validate_mnemonic(phrase: &str) -> bool {
    parse(phrase).is_ok()
}

fn parse(phrase: &str) -> Result<Mnemonic, WalletError> {
    let normalized = normalize(phrase);
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    if mnemonic.word_count() != WORD_COUNT {
        return Err(WalletError::InvalidMnemonic(format!(
            "expected {WORD_COUNT} words, got {}",
            mnemonic.word_count()
        )));
    }
    Ok(mnemonic)
}

/// Lowercase and collapse whitespace so pasted phrases parse.
fn normalize(phrase: &str) -> Zeroizing<String> {
    Zeroizing::new(
        phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Derive the 64-byte seed from a mnemonic. The passphrase is always empty.
pub fn mnemonic_to_seed(phrase: &SecretString) -> Result<Zeroizing<[u8; 64]>, WalletError> {
    let mnemonic = parse(phrase.expose_secret())?;
    Ok(Zeroizing::new(mnemonic.to_seed("")))
}

/// Canonical single-spaced lowercase form of a valid phrase.
pub fn canonical_phrase(phrase: &str) -> Result<SecretString, WalletError> {
    let mnemonic = parse(phrase)?;
    Ok(SecretString::from(mnemonic.to_string()))
}

/// Get the word list for autocomplete
pub fn word_list() -> &'static [&'static str] {
    Language::English.word_list()
}

/// Validate a single word against the BIP-39 word list
pub fn is_valid_word(word: &str) -> bool {
    Language::English.find_word(word).is_some()
}
