use bitcoin::hashes::Hash;
use bitcoin::{PubkeyHash, ScriptBuf, ScriptHash};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::ShicError;
use crate::network::{ADDRESS_PREFIX, PUBKEY_HASH_VERSION, SCRIPT_HASH_VERSION};

/// Decoded form of a Shibacoin Base58Check address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPayload {
    PubkeyHash([u8; 20]),
    ScriptHash([u8; 20]),
}

impl AddressPayload {
    /// Locking script paying to this address.
    pub fn script_pubkey(&self) -> ScriptBuf {
        match self {
            AddressPayload::PubkeyHash(h) => ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(*h)),
            AddressPayload::ScriptHash(h) => ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(*h)),
        }
    }
}

/// RIPEMD-160(SHA-256(data)).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// Derive the P2PKH address for a 33-byte compressed secp256k1 public key.
///
/// `Base58Check(0x3f || HASH160(pubkey))`, which always renders with a
/// leading `S`.
pub fn pubkey_to_address(pubkey: &[u8; 33]) -> Result<String, ShicError> {
    if pubkey[0] != 0x02 && pubkey[0] != 0x03 {
        return Err(ShicError::InvalidPublicKey(
            "compressed key must start with 0x02 or 0x03".into(),
        ));
    }
    Ok(bs58::encode(hash160(pubkey))
        .with_check_version(PUBKEY_HASH_VERSION)
        .into_string())
}

/// Decode and classify a Shibacoin address.
pub fn decode_address(address: &str) -> Result<AddressPayload, ShicError> {
    let decoded = bs58::decode(address.trim())
        .with_check(None)
        .into_vec()
        .map_err(|e| ShicError::InvalidAddress(format!("invalid base58check: {e}")))?;

    // version (1) + hash (20)
    if decoded.len() != 21 {
        return Err(ShicError::InvalidAddress(format!(
            "expected 21 payload bytes, got {}",
            decoded.len()
        )));
    }

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&decoded[1..]);
    match decoded[0] {
        PUBKEY_HASH_VERSION => Ok(AddressPayload::PubkeyHash(hash)),
        SCRIPT_HASH_VERSION => Ok(AddressPayload::ScriptHash(hash)),
        other => Err(ShicError::InvalidAddress(format!(
            "unknown version byte 0x{other:02x}"
        ))),
    }
}

/// Locking script for any decodable Shibacoin address.
pub fn address_to_script_pubkey(address: &str) -> Result<ScriptBuf, ShicError> {
    decode_address(address).map(|payload| payload.script_pubkey())
}

/// Check that `address` can receive a send: it must carry the `S` prefix and
/// decode as a pay-to-pubkey-hash address.
pub fn validate_destination(address: &str) -> Result<AddressPayload, ShicError> {
    if !address.starts_with(ADDRESS_PREFIX) {
        return Err(ShicError::InvalidAddress(format!(
            "address must start with '{ADDRESS_PREFIX}'"
        )));
    }
    match decode_address(address)? {
        payload @ AddressPayload::PubkeyHash(_) => Ok(payload),
        AddressPayload::ScriptHash(_) => Err(ShicError::InvalidAddress(
            "script-hash address cannot carry the 'S' prefix".into(),
        )),
    }
}
