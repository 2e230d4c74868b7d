use chain_shic::address::pubkey_to_address;
use chain_shic::transaction::KeySigner;
use chain_shic::wif::encode_wif;
use secrecy::SecretString;

use crate::error::WalletError;
use crate::hd_derivation::{derive_account_node, derive_child, path_for_index};
use crate::types::DerivedAddress;

/// Derive the receive address of account `index` from seed bytes
pub fn derive_address(seed: &[u8], index: u32) -> Result<DerivedAddress, WalletError> {
    let node = derive_child(&derive_account_node(seed)?, index)?;
    let public_key = node.public_key();
    let address = pubkey_to_address(&public_key)?;

    Ok(DerivedAddress {
        index,
        address,
        public_key: hex::encode(public_key),
        derivation_path: path_for_index(index),
    })
}

/// WIF export of the private key for account `index`.
pub fn derive_wif(seed: &[u8], index: u32) -> Result<SecretString, WalletError> {
    let node = derive_child(&derive_account_node(seed)?, index)?;
    Ok(SecretString::from(encode_wif(&node.private_key())))
}

/// Transaction signer for account `index`. Built per signing operation and
/// dropped with it.
pub fn derive_signer(seed: &[u8], index: u32) -> Result<KeySigner, WalletError> {
    let node = derive_child(&derive_account_node(seed)?, index)?;
    Ok(KeySigner::from_secret_bytes(&node.private_key())?)
}
