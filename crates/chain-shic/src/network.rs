/// Base58Check version byte for pay-to-pubkey-hash addresses (`S...`).
pub const PUBKEY_HASH_VERSION: u8 = 0x3f;

/// Base58Check version byte for pay-to-script-hash addresses.
pub const SCRIPT_HASH_VERSION: u8 = 0x05;

/// Version byte for WIF-encoded private keys.
pub const WIF_VERSION: u8 = 0x80;

/// BIP-44 coin type registered for Shibacoin.
pub const COIN_TYPE: u32 = 2070;

/// Minor units per SHIC.
pub const COIN: u64 = 100_000_000;

/// Flat network fee charged on every send: 0.1 SHIC.
pub const FIXED_FEE_SAT: u64 = 10_000_000;

/// Outputs at or below this value are not worth creating.
pub const DUST_THRESHOLD_SAT: u64 = 546;

/// Leading character shared by every mainnet P2PKH address.
pub const ADDRESS_PREFIX: char = 'S';

/// Default block-explorer endpoints.
pub const BLOCKBOOK_URL: &str = "https://blockbook.shibaexplorer.com";
pub const EXPLORER_URL: &str = "https://shibaexplorer.com";
pub const ELECTRUM_URL: &str = "https://electrum.shibaexplorer.com";

/// Static parameters of the Shibacoin main network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    pub name: &'static str,
    pub ticker: &'static str,
    pub decimals: u8,
    pub pubkey_hash: u8,
    pub script_hash: u8,
    pub wif: u8,
    pub bip32_public: u32,
    pub bip32_private: u32,
    pub message_prefix: &'static str,
    pub coin_type: u32,
}

/// Shibacoin mainnet.
pub const SHIBACOIN: NetworkParams = NetworkParams {
    name: "shibacoin",
    ticker: "SHIC",
    decimals: 8,
    pubkey_hash: PUBKEY_HASH_VERSION,
    script_hash: SCRIPT_HASH_VERSION,
    wif: WIF_VERSION,
    bip32_public: 0x0488_b21e,
    bip32_private: 0x0488_ade4,
    message_prefix: "\x19Shiba Signed Message:\n",
    coin_type: COIN_TYPE,
};

impl NetworkParams {
    /// Account-level derivation path: `m/44'/coin'/0'`.
    pub fn account_path(&self) -> String {
        format!("m/44'/{}'/0'", self.coin_type)
    }
}

impl std::fmt::Display for NetworkParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.ticker)
    }
}

/// Explorer page for a broadcast transaction.
pub fn tx_explorer_url(txid: &str) -> String {
    format!("{EXPLORER_URL}/tx/{txid}")
}
