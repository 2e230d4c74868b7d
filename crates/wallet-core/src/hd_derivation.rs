use bip32::{ChildNumber, DerivationPath, XPrv};
use chain_shic::network::SHIBACOIN;
use zeroize::Zeroizing;

use crate::error::WalletError;

/// BIP-44 account path shared by every account:
/// `m/purpose'/coin_type'/account'` with coin type 2070.
///
/// Accounts differ only in the non-hardened child index below this node.
pub fn account_path() -> String {
    SHIBACOIN.account_path()
}

/// Full derivation path of the account at `index`.
pub fn path_for_index(index: u32) -> String {
    format!("{}/{index}", account_path())
}

/// Extended private key at some point of the derivation tree.
pub struct KeyNode {
    xprv: XPrv,
}

impl KeyNode {
    /// 33-byte compressed secp256k1 public key.
    pub fn public_key(&self) -> [u8; 33] {
        self.xprv.public_key().to_bytes()
    }

    /// Raw 32-byte secret. Wiped when the returned buffer drops.
    pub fn private_key(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.xprv.to_bytes())
    }
}

/// Apply the account path to a BIP-39 seed.
pub fn derive_account_node(seed: &[u8]) -> Result<KeyNode, WalletError> {
    let path: DerivationPath = account_path()
        .parse()
        .map_err(|e: bip32::Error| WalletError::DerivationFailed(e.to_string()))?;

    let xprv = XPrv::derive_from_path(seed, &path)
        .map_err(|e| WalletError::DerivationFailed(e.to_string()))?;

    Ok(KeyNode { xprv })
}

/// Non-hardened child `index` of `parent`.
pub fn derive_child(parent: &KeyNode, index: u32) -> Result<KeyNode, WalletError> {
    let child = ChildNumber::new(index, false)
        .map_err(|e| WalletError::DerivationFailed(format!("child index {index}: {e}")))?;

    let xprv = parent
        .xprv
        .derive_child(child)
        .map_err(|e| WalletError::DerivationFailed(e.to_string()))?;

    Ok(KeyNode { xprv })
}
