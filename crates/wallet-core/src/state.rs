use secrecy::SecretString;

use crate::types::{Account, NodeEntry};

/// In-memory wallet state for one session.
///
/// Mutated only through [`crate::registry::AccountRegistry`], which persists
/// every change it makes.
#[derive(Debug, Default)]
pub struct WalletState {
    pub(crate) mnemonic: Option<SecretString>,
    pub(crate) selected_address: Option<String>,
    pub(crate) accounts: Vec<Account>,
    pub(crate) selected_index: usize,
    pub(crate) nodes: Vec<NodeEntry>,
    pub(crate) selected_node_index: usize,
    pub(crate) password: Option<SecretString>,
    pub(crate) name: Option<String>,
    pub(crate) input_words_backup: Vec<String>,
    pub(crate) encryption_available: bool,
    pub(crate) balance_sat: Option<u64>,
    pub(crate) price_usd: Option<f64>,
}

impl WalletState {
    pub fn has_mnemonic(&self) -> bool {
        self.mnemonic.is_some()
    }

    pub fn mnemonic(&self) -> Option<&SecretString> {
        self.mnemonic.as_ref()
    }

    pub fn selected_address(&self) -> Option<&str> {
        self.selected_address.as_deref()
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn selected_account(&self) -> Option<&Account> {
        self.accounts.get(self.selected_index)
    }

    pub fn nodes(&self) -> &[NodeEntry] {
        &self.nodes
    }

    pub fn selected_node_index(&self) -> usize {
        self.selected_node_index
    }

    pub fn selected_node(&self) -> Option<&NodeEntry> {
        self.nodes.get(self.selected_node_index)
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Display name of the selected account.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn input_words_backup(&self) -> &[String] {
        &self.input_words_backup
    }

    pub fn encryption_available(&self) -> bool {
        self.encryption_available
    }

    /// Last balance fetched for the selected account, in minor units.
    pub fn balance_sat(&self) -> Option<u64> {
        self.balance_sat
    }

    pub fn price_usd(&self) -> Option<f64> {
        self.price_usd
    }

    /// Visible accounts in index order.
    pub fn visible_accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter().filter(|a| a.visible)
    }
}
