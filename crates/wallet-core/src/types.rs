use serde::{Deserialize, Serialize};

/// Address derived for one account index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAddress {
    pub index: u32,
    pub address: String,
    /// Hex-encoded compressed public key.
    pub public_key: String,
    pub derivation_path: String,
}

/// One wallet account. `index` equals its position in the account list and
/// its child index under the account derivation node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub index: usize,
    pub name: String,
    pub address: String,
    pub visible: bool,
}

impl Account {
    /// Name given to accounts created without one.
    pub fn default_name(index: usize) -> String {
        format!("Account {index}")
    }
}

/// Remote node the user can pick in settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub url: String,
    pub name: String,
}

/// Display names of the node list installed on wallet creation.
pub const DEFAULT_NODE_NAMES: [&str; 3] = ["polaire", "blu & Asia", "johnnyb Us East"];

/// Node list installed on wallet creation. URLs start empty and are filled in
/// by the user.
pub fn default_nodes() -> Vec<NodeEntry> {
    DEFAULT_NODE_NAMES
        .iter()
        .map(|name| NodeEntry {
            url: String::new(),
            name: (*name).to_string(),
        })
        .collect()
}
