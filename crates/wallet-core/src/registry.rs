//! Account registry: the one writer of [`WalletState`].
//!
//! Every mutation updates memory first, then queues the changed fields on
//! the encrypted store.

use chain_shic::transaction::KeySigner;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::address::{derive_address, derive_signer, derive_wif};
use crate::error::WalletError;
use crate::explorer::ChainClient;
use crate::mnemonic::{canonical_phrase, generate_mnemonic, mnemonic_to_seed};
use crate::session::AuthSession;
use crate::state::WalletState;
use crate::store::{keys, EncryptedStore};
use crate::types::{default_nodes, Account, NodeEntry, DEFAULT_NODE_NAMES};

/// Separator of list-valued store fields.
const LIST_SEP: char = ',';

fn split_list(raw: Option<String>) -> Option<Vec<String>> {
    raw.map(|s| {
        if s.is_empty() {
            Vec::new()
        } else {
            s.split(LIST_SEP).map(str::to_string).collect()
        }
    })
}

fn join_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(",")
}

fn check_list_item(kind: &str, value: &str) -> Result<(), WalletError> {
    if value.contains(LIST_SEP) {
        return Err(WalletError::InvalidAccountName(format!(
            "{kind} may not contain '{LIST_SEP}': {value:?}"
        )));
    }
    Ok(())
}

pub struct AccountRegistry {
    state: WalletState,
    store: EncryptedStore,
    session: AuthSession,
}

impl AccountRegistry {
    /// Empty wallet over `store`; nothing is read.
    pub fn new(store: EncryptedStore) -> Self {
        let state = WalletState {
            encryption_available: true,
            ..Default::default()
        };
        Self {
            state,
            session: AuthSession::new(store.clone()),
            store,
        }
    }

    /// Rebuild the wallet from whatever the store holds.
    ///
    /// Missing fields take their defaults. List fields of unequal length are
    /// truncated to the shortest with a warning.
    pub fn load(store: EncryptedStore) -> Self {
        let mnemonic = store.load_field(keys::SEED_PHRASE).map(SecretString::from);

        let addresses = split_list(store.load_field(keys::WALLET_LIST)).unwrap_or_default();
        let names = split_list(store.load_field(keys::NAME_LIST));
        let visible = split_list(store.load_field(keys::VISIBLE_WALLET_LIST));

        let mut count = addresses.len();
        for (field, len) in [
            (keys::NAME_LIST, names.as_ref().map(Vec::len)),
            (keys::VISIBLE_WALLET_LIST, visible.as_ref().map(Vec::len)),
        ] {
            if let Some(len) = len {
                if len != addresses.len() {
                    warn!(field, len, accounts = addresses.len(), "account list length mismatch");
                }
                count = count.min(len);
            }
        }

        let accounts: Vec<Account> = addresses
            .into_iter()
            .take(count)
            .enumerate()
            .map(|(index, address)| Account {
                index,
                name: names
                    .as_ref()
                    .and_then(|n| n.get(index).cloned())
                    .unwrap_or_else(|| Account::default_name(index)),
                address,
                visible: visible
                    .as_ref()
                    .and_then(|v| v.get(index))
                    .map_or(true, |flag| flag != "false"),
            })
            .collect();

        let selected_index = store
            .load_field(keys::SELECTED_WALLET_INDEX)
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|i| *i < accounts.len())
            .unwrap_or(0);

        // Absent after a clear; accounts alone do not restore it.
        let selected_address = store.load_field(keys::WALLET);

        let nodes = match (
            split_list(store.load_field(keys::NODE_LIST)),
            split_list(store.load_field(keys::NODE_NAME_LIST)),
        ) {
            (None, None) => default_nodes(),
            (urls, names) => {
                let urls = urls.unwrap_or_default();
                let names = names.unwrap_or_default();
                if urls.len() != names.len() {
                    warn!(urls = urls.len(), names = names.len(), "node list length mismatch");
                }
                // One node per URL; a missing name falls back to the default label.
                urls.into_iter()
                    .enumerate()
                    .map(|(i, url)| NodeEntry {
                        name: names
                            .get(i)
                            .cloned()
                            .or_else(|| DEFAULT_NODE_NAMES.get(i).map(|n| n.to_string()))
                            .unwrap_or_default(),
                        url,
                    })
                    .collect()
            }
        };
        let selected_node_index = store
            .load_field(keys::SELECTED_NODE_INDEX)
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|i| *i < nodes.len())
            .unwrap_or(0);

        let input_words_backup = split_list(store.load_field(keys::INPUT_WORDS_BACKUP))
            .unwrap_or_default();

        let state = WalletState {
            mnemonic,
            selected_address,
            accounts,
            selected_index,
            nodes,
            selected_node_index,
            password: store.load_field(keys::PASSWORD).map(SecretString::from),
            name: store.load_field(keys::NAME),
            input_words_backup,
            encryption_available: true,
            balance_sat: None,
            price_usd: None,
        };
        info!(
            accounts = state.accounts.len(),
            has_mnemonic = state.mnemonic.is_some(),
            "wallet loaded"
        );

        Self {
            state,
            session: AuthSession::restore(store.clone()),
            store,
        }
    }

    pub fn state(&self) -> &WalletState {
        &self.state
    }

    pub fn store(&self) -> &EncryptedStore {
        &self.store
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Generate a fresh phrase and create account 0 from it.
    pub fn new_wallet(&mut self) -> Result<Account, WalletError> {
        let mnemonic = generate_mnemonic()?;
        self.create_first_account(mnemonic)
    }

    /// Restore from a user-supplied phrase. Replaces any existing accounts.
    pub fn import_wallet(&mut self, phrase: &str) -> Result<Account, WalletError> {
        let mnemonic = canonical_phrase(phrase)?;
        self.create_first_account(mnemonic)
    }

    /// Derive account 0, make it the only and selected account, store the
    /// phrase, and reset the node list.
    pub fn create_first_account(&mut self, mnemonic: SecretString) -> Result<Account, WalletError> {
        let seed = mnemonic_to_seed(&mnemonic)?;
        let derived = derive_address(&seed[..], 0)?;

        let account = Account {
            index: 0,
            name: Account::default_name(0),
            address: derived.address,
            visible: true,
        };

        self.state.mnemonic = Some(mnemonic);
        self.state.accounts = vec![account.clone()];
        self.state.nodes = default_nodes();
        self.state.selected_node_index = 0;
        self.state.balance_sat = None;
        self.apply_selection(0);

        self.store.save_field(
            keys::SEED_PHRASE,
            self.state.mnemonic.as_ref().map(|m| m.expose_secret()),
        );
        self.persist_accounts();
        self.persist_nodes();
        info!(address = %account.address, "wallet created");
        Ok(account)
    }

    /// Derive the next account, append it, and select it.
    pub fn add_account(&mut self, name: Option<&str>) -> Result<Account, WalletError> {
        if let Some(name) = name {
            check_list_item("account name", name)?;
        }
        let index = self.state.accounts.len();
        let child = u32::try_from(index)
            .map_err(|_| WalletError::DerivationFailed(format!("index {index} out of range")))?;

        let seed = self.seed()?;
        let derived = derive_address(&seed[..], child)?;

        let account = Account {
            index,
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| Account::default_name(index)),
            address: derived.address,
            visible: true,
        };
        self.state.accounts.push(account.clone());
        self.apply_selection(index);
        self.persist_accounts();
        info!(index, address = %account.address, "account added");
        Ok(account)
    }

    /// Point the selection at `index`. Nothing is re-derived.
    pub fn select_account(&mut self, index: usize) -> Result<&Account, WalletError> {
        if index >= self.state.accounts.len() {
            return Err(WalletError::AccountNotFound(index));
        }
        self.apply_selection(index);
        self.store
            .save_field(keys::SELECTED_WALLET_INDEX, Some(&index.to_string()));
        self.store
            .save_field(keys::WALLET, self.state.selected_address.as_deref());
        self.store.save_field(keys::NAME, self.state.name.as_deref());
        Ok(&self.state.accounts[index])
    }

    pub fn rename_account(&mut self, index: usize, name: &str) -> Result<(), WalletError> {
        check_list_item("account name", name)?;
        let account = self
            .state
            .accounts
            .get_mut(index)
            .ok_or(WalletError::AccountNotFound(index))?;
        account.name = name.to_string();
        if index == self.state.selected_index {
            self.state.name = Some(name.to_string());
            self.store.save_field(keys::NAME, Some(name));
        }
        self.store.save_field(keys::NAME_LIST, Some(&self.name_list()));
        Ok(())
    }

    pub fn set_account_visibility(&mut self, index: usize, visible: bool) -> Result<(), WalletError> {
        let account = self
            .state
            .accounts
            .get_mut(index)
            .ok_or(WalletError::AccountNotFound(index))?;
        account.visible = visible;
        self.store
            .save_field(keys::VISIBLE_WALLET_LIST, Some(&self.visible_list()));
        Ok(())
    }

    pub fn set_password(&mut self, password: &str) {
        self.state.password = Some(SecretString::from(password.to_string()));
        self.store.save_field(keys::PASSWORD, Some(password));
    }

    /// Whether `candidate` equals the stored password. False when none is set.
    pub fn verify_password(&self, candidate: &str) -> bool {
        self.state
            .password
            .as_ref()
            .is_some_and(|p| p.expose_secret() == candidate)
    }

    pub fn select_node(&mut self, index: usize) -> Result<(), WalletError> {
        if index >= self.state.nodes.len() {
            return Err(WalletError::Config(format!("no node at index {index}")));
        }
        self.state.selected_node_index = index;
        self.store
            .save_field(keys::SELECTED_NODE_INDEX, Some(&index.to_string()));
        Ok(())
    }

    pub fn set_node_url(&mut self, index: usize, url: &str) -> Result<(), WalletError> {
        if url.contains(LIST_SEP) {
            return Err(WalletError::Config(format!(
                "node url may not contain '{LIST_SEP}'"
            )));
        }
        let node = self
            .state
            .nodes
            .get_mut(index)
            .ok_or_else(|| WalletError::Config(format!("no node at index {index}")))?;
        node.url = url.to_string();
        self.persist_nodes();
        Ok(())
    }

    /// Words typed so far on the restore screen.
    pub fn set_input_words_backup(&mut self, words: Vec<String>) -> Result<(), WalletError> {
        for word in &words {
            check_list_item("backup word", word)?;
        }
        let joined = join_list(words.iter().map(String::as_str));
        self.state.input_words_backup = words;
        self.store
            .save_field(keys::INPUT_WORDS_BACKUP, Some(&joined));
        Ok(())
    }

    /// Forget the phrase, selected address, password, and display name.
    /// Accounts, nodes, and the session token are kept. Safe to repeat.
    pub fn clear_wallet_data(&mut self) {
        self.state.mnemonic = None;
        self.state.selected_address = None;
        self.state.password = None;
        self.state.name = None;
        self.store.remove_fields(&[
            keys::SEED_PHRASE,
            keys::WALLET,
            keys::PASSWORD,
            keys::NAME,
        ]);
        debug!("wallet data cleared");
    }

    /// WIF export of account `index`, derived on demand.
    pub fn private_key_wif(&self, index: usize) -> Result<SecretString, WalletError> {
        let child = self.child_index(index)?;
        let seed = self.seed()?;
        derive_wif(&seed[..], child)
    }

    /// Signer for account `index`, derived for one signing operation.
    pub(crate) fn signer_for(&self, index: usize) -> Result<KeySigner, WalletError> {
        let child = self.child_index(index)?;
        let seed = self.seed()?;
        derive_signer(&seed[..], child)
    }

    /// Refresh the selected account's balance.
    pub async fn update_balance(&mut self, client: &dyn ChainClient) -> Result<u64, WalletError> {
        let address = self
            .state
            .selected_address
            .clone()
            .ok_or_else(|| WalletError::DerivationFailed("no account selected".into()))?;
        let balance = client.balance(&address).await?;
        self.state.balance_sat = Some(balance);
        Ok(balance)
    }

    pub async fn update_price_usd(&mut self, client: &dyn ChainClient) -> Result<f64, WalletError> {
        let price = client.price_usd().await?;
        self.state.price_usd = Some(price);
        Ok(price)
    }

    fn seed(&self) -> Result<Zeroizing<[u8; 64]>, WalletError> {
        let mnemonic = self
            .state
            .mnemonic
            .as_ref()
            .ok_or_else(|| WalletError::DerivationFailed("wallet is locked: no seed".into()))?;
        mnemonic_to_seed(mnemonic)
    }

    fn child_index(&self, index: usize) -> Result<u32, WalletError> {
        if index >= self.state.accounts.len() {
            return Err(WalletError::AccountNotFound(index));
        }
        u32::try_from(index).map_err(|_| WalletError::AccountNotFound(index))
    }

    fn apply_selection(&mut self, index: usize) {
        let account = &self.state.accounts[index];
        self.state.selected_index = index;
        self.state.selected_address = Some(account.address.clone());
        self.state.name = Some(account.name.clone());
        self.state.balance_sat = None;
    }

    fn name_list(&self) -> String {
        join_list(self.state.accounts.iter().map(|a| a.name.as_str()))
    }

    fn visible_list(&self) -> String {
        join_list(
            self.state
                .accounts
                .iter()
                .map(|a| if a.visible { "true" } else { "false" }),
        )
    }

    fn persist_accounts(&self) {
        let addresses = join_list(self.state.accounts.iter().map(|a| a.address.as_str()));
        self.store.save_field(keys::WALLET_LIST, Some(&addresses));
        self.store.save_field(keys::NAME_LIST, Some(&self.name_list()));
        self.store
            .save_field(keys::VISIBLE_WALLET_LIST, Some(&self.visible_list()));
        self.store.save_field(
            keys::SELECTED_WALLET_INDEX,
            Some(&self.state.selected_index.to_string()),
        );
        self.store
            .save_field(keys::WALLET, self.state.selected_address.as_deref());
        self.store.save_field(keys::NAME, self.state.name.as_deref());
    }

    fn persist_nodes(&self) {
        let urls = join_list(self.state.nodes.iter().map(|n| n.url.as_str()));
        let names = join_list(self.state.nodes.iter().map(|n| n.name.as_str()));
        self.store.save_field(keys::NODE_LIST, Some(&urls));
        self.store.save_field(keys::NODE_NAME_LIST, Some(&names));
        self.store.save_field(
            keys::SELECTED_NODE_INDEX,
            Some(&self.state.selected_node_index.to_string()),
        );
    }
}
