use zeroize::{Zeroize, Zeroizing};

use crate::error::ShicError;
use crate::network::WIF_VERSION;

/// Suffix marking a WIF key whose public key is used in compressed form.
const COMPRESSED_FLAG: u8 = 0x01;

/// Encode a 32-byte secp256k1 secret as compressed WIF.
///
/// `Base58Check(0x80 || key || 0x01)`.
pub fn encode_wif(private_key: &[u8; 32]) -> String {
    let mut payload = Zeroizing::new([0u8; 33]);
    payload[..32].copy_from_slice(private_key);
    payload[32] = COMPRESSED_FLAG;
    bs58::encode(&payload[..])
        .with_check_version(WIF_VERSION)
        .into_string()
}

/// Decode a compressed WIF string back to the raw secret.
pub fn decode_wif(wif: &str) -> Result<Zeroizing<[u8; 32]>, ShicError> {
    let mut decoded = bs58::decode(wif.trim())
        .with_check(None)
        .into_vec()
        .map_err(|e| ShicError::InvalidWif(format!("invalid base58check: {e}")))?;

    let result = parse_payload(&decoded);
    decoded.zeroize();
    result
}

fn parse_payload(decoded: &[u8]) -> Result<Zeroizing<[u8; 32]>, ShicError> {
    match decoded.len() {
        34 => {}
        33 => {
            return Err(ShicError::InvalidWif(
                "uncompressed keys are not supported".into(),
            ))
        }
        n => return Err(ShicError::InvalidWif(format!("unexpected length {n}"))),
    }
    if decoded[0] != WIF_VERSION {
        return Err(ShicError::InvalidWif(format!(
            "unknown version byte 0x{:02x}",
            decoded[0]
        )));
    }
    if decoded[33] != COMPRESSED_FLAG {
        return Err(ShicError::InvalidWif("missing compression flag".into()));
    }

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&decoded[1..33]);
    Ok(key)
}
