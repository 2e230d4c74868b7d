//! Cross-crate integration tests exercising the full pipeline:
//! mnemonic -> accounts -> encrypted store -> build/sign/finalize -> broadcast.
//!
//! The chain is replaced by an in-process [`ChainClient`] that serves one
//! funding transaction and records what gets broadcast.

use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use chain_shic::address::address_to_script_pubkey;
use chain_shic::transaction::ChangePolicy;
use chain_shic::utxo::{decode_transaction_hex, UtxoCandidate};
use crypto_utils::AppKey;
use parking_lot::Mutex;
use secrecy::ExposeSecret;
use wallet_core::address::derive_address;
use wallet_core::mnemonic::mnemonic_to_seed;
use wallet_core::store::keys;
use wallet_core::*;

const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
const FIRST_ADDRESS: &str = "SQpn5jXotrVpB8Jk5ZEPWJ3GpupnYppVKB";
const DESTINATION: &str = "SPCHCmSzgsQQZirfqwxqHrToBpBRX4zxCQ";
const PASSWORD: &str = "hunter2";

fn memory_store() -> EncryptedStore {
    EncryptedStore::in_memory(AppKey::from_bytes([0x11; 32])).unwrap()
}

fn funding_tx(value_sat: u64, to: &str) -> Transaction {
    Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new("cd".repeat(32).parse().unwrap(), 1),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(value_sat),
            script_pubkey: address_to_script_pubkey(to).unwrap(),
        }],
    }
}

/// Scripted chain: one balance, one funding output, and a broadcast log.
struct MockChain {
    balance_sat: u64,
    funding: Transaction,
    reject_with: Option<String>,
    unspent_queries: Mutex<Vec<(String, u64)>>,
    broadcasts: Mutex<Vec<String>>,
}

impl MockChain {
    fn funded(balance_sat: u64, funding: Transaction) -> Self {
        Self {
            balance_sat,
            funding,
            reject_with: None,
            unspent_queries: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn balance(&self, _address: &str) -> Result<u64, WalletError> {
        Ok(self.balance_sat)
    }

    async fn price_usd(&self) -> Result<f64, WalletError> {
        Ok(0.0000042)
    }

    async fn unspent(
        &self,
        address: &str,
        amount_sat: u64,
    ) -> Result<Vec<UtxoCandidate>, WalletError> {
        self.unspent_queries
            .lock()
            .push((address.to_string(), amount_sat));
        Ok(vec![UtxoCandidate {
            txid: self.funding.compute_txid().to_string(),
            vout: 0,
        }])
    }

    async fn raw_transaction(&self, txid: &str) -> Result<String, WalletError> {
        assert_eq!(txid, self.funding.compute_txid().to_string());
        Ok(serialize_hex(&self.funding))
    }

    async fn broadcast(&self, raw_hex: &str) -> Result<String, WalletError> {
        self.broadcasts.lock().push(raw_hex.to_string());
        if let Some(reason) = &self.reject_with {
            return Err(WalletError::BroadcastRejected(reason.clone()));
        }
        let tx = decode_transaction_hex(raw_hex).map_err(WalletError::from)?;
        Ok(tx.compute_txid().to_string())
    }
}

fn imported_registry() -> AccountRegistry {
    let mut registry = AccountRegistry::new(memory_store());
    registry.import_wallet(TEST_MNEMONIC).unwrap();
    registry.set_password(PASSWORD);
    registry
}

fn send_request(amount_sat: u64) -> SendRequest {
    SendRequest {
        from_index: None,
        destination: DESTINATION.into(),
        amount_sat,
        password: PASSWORD.into(),
    }
}

// ─── Wallet creation ────────────────────────────────────────────────

#[tokio::test]
async fn test_fresh_wallet_persists_first_account() {
    let store = memory_store();
    let mut registry = AccountRegistry::new(store.clone());
    let account = registry.new_wallet().unwrap();

    assert!(account.address.starts_with('S'));
    assert_eq!(account.name, "Account 0");
    assert!(registry.state().has_mnemonic());

    store.flush().await;
    assert_eq!(
        store.load_field(keys::WALLET_LIST).as_deref(),
        Some(account.address.as_str())
    );
    assert_eq!(store.load_field(keys::NAME_LIST).as_deref(), Some("Account 0"));
    assert_eq!(
        store.load_field(keys::NODE_NAME_LIST).as_deref(),
        Some("polaire,blu & Asia,johnnyb Us East")
    );
    let phrase = store.load_field(keys::SEED_PHRASE).unwrap();
    assert_eq!(phrase.split_whitespace().count(), 12);
}

#[tokio::test]
async fn test_import_yields_known_address() {
    let registry = imported_registry();
    assert_eq!(registry.state().selected_address(), Some(FIRST_ADDRESS));
    assert_eq!(
        registry.state().mnemonic().map(|m| m.expose_secret().to_string()),
        Some(TEST_MNEMONIC.to_string())
    );
}

#[tokio::test]
async fn test_added_accounts_are_distinct_and_match_derivation() {
    let mut registry = imported_registry();
    registry.add_account(None).unwrap();
    registry.add_account(None).unwrap();

    let accounts = registry.state().accounts();
    assert_eq!(accounts.len(), 3);

    let seed = mnemonic_to_seed(&canonical(TEST_MNEMONIC)).unwrap();
    for account in accounts {
        let derived = derive_address(&seed[..], account.index as u32).unwrap();
        assert_eq!(account.address, derived.address);
    }
    let mut addresses: Vec<_> = accounts.iter().map(|a| a.address.as_str()).collect();
    addresses.sort();
    addresses.dedup();
    assert_eq!(addresses.len(), 3);
}

fn canonical(phrase: &str) -> secrecy::SecretString {
    wallet_core::mnemonic::canonical_phrase(phrase).unwrap()
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let key = AppKey::from_bytes([0x22; 32]);

    {
        let store =
            EncryptedStore::open(Arc::new(FileBackend::new(&path)), key.clone()).unwrap();
        let mut registry = AccountRegistry::new(store.clone());
        registry.import_wallet(TEST_MNEMONIC).unwrap();
        registry.add_account(Some("Savings")).unwrap();
        registry.set_password(PASSWORD);
        store.flush().await;
    }

    // Values on disk are sealed, never plaintext.
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("abandon"));
    assert!(!raw.contains(PASSWORD));

    let store = EncryptedStore::open(Arc::new(FileBackend::new(&path)), key).unwrap();
    let registry = AccountRegistry::load(store);
    assert_eq!(registry.state().accounts().len(), 2);
    assert_eq!(registry.state().selected_index(), 1);
    assert_eq!(registry.state().name(), Some("Savings"));
    assert!(registry.verify_password(PASSWORD));
}

#[tokio::test]
async fn test_wrong_key_reads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    let store =
        EncryptedStore::open(Arc::new(FileBackend::new(&path)), AppKey::from_bytes([1; 32]))
            .unwrap();
    store.save_field(keys::PASSWORD, Some(PASSWORD));
    store.flush().await;

    let other =
        EncryptedStore::open(Arc::new(FileBackend::new(&path)), AppKey::from_bytes([2; 32]))
            .unwrap();
    assert!(matches!(
        other.load_field_detailed(keys::PASSWORD),
        FieldRead::Corrupt(_)
    ));
    assert_eq!(other.load_field(keys::PASSWORD), None);
}

// ─── Clearing ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_clear_twice_matches_clear_once() {
    let store = memory_store();
    let mut registry = AccountRegistry::new(store.clone());
    registry.import_wallet(TEST_MNEMONIC).unwrap();
    registry.set_password(PASSWORD);

    registry.clear_wallet_data();
    store.flush().await;
    let once: Vec<_> = [keys::SEED_PHRASE, keys::WALLET, keys::PASSWORD, keys::NAME, keys::WALLET_LIST]
        .iter()
        .map(|k| store.load_field(k))
        .collect();

    registry.clear_wallet_data();
    store.flush().await;
    let twice: Vec<_> = [keys::SEED_PHRASE, keys::WALLET, keys::PASSWORD, keys::NAME, keys::WALLET_LIST]
        .iter()
        .map(|k| store.load_field(k))
        .collect();

    assert_eq!(once, twice);
    assert!(once[..4].iter().all(Option::is_none));
    assert_eq!(once[4].as_deref(), Some(FIRST_ADDRESS));
}

// ─── Send ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_builds_signs_and_broadcasts() {
    let registry = imported_registry();
    let chain = MockChain::funded(100_000_000, funding_tx(100_000_000, FIRST_ADDRESS));
    let mut flow = SendFlow::new(10_000_000, ChangePolicy::DonateToFee);

    let receipt = flow
        .run(&registry, &chain, send_request(50_000_000))
        .await
        .unwrap();

    assert_eq!(flow.state(), SendState::Succeeded);
    assert_eq!(
        flow.trace(),
        [
            SendState::Idle,
            SendState::Validating,
            SendState::FetchingUtxo,
            SendState::Building,
            SendState::Signing,
            SendState::Validated,
            SendState::Finalized,
            SendState::Broadcasting,
            SendState::Succeeded,
        ]
    );
    assert_eq!(
        chain.unspent_queries.lock().as_slice(),
        [(FIRST_ADDRESS.to_string(), 40_000_000)]
    );

    assert_eq!(receipt.sent_sat, 40_000_000);
    assert_eq!(receipt.fee_sat, 60_000_000);
    assert!(receipt.donated);
    assert!(receipt.explorer_url.ends_with(&receipt.txid));

    let broadcasts = chain.broadcasts.lock();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0], receipt.raw_hex);

    let tx = decode_transaction_hex(&receipt.raw_hex).unwrap();
    assert_eq!(tx.compute_txid().to_string(), receipt.txid);
    assert_eq!(tx.input.len(), 1);
    assert_eq!(tx.input[0].previous_output.txid, chain.funding.compute_txid());
    assert_eq!(tx.output.len(), 1);
    assert_eq!(tx.output[0].value.to_sat(), 40_000_000);
    assert_eq!(
        tx.output[0].script_pubkey,
        address_to_script_pubkey(DESTINATION).unwrap()
    );

    // scriptSig ends with the sender's compressed public key.
    let seed = mnemonic_to_seed(&canonical(TEST_MNEMONIC)).unwrap();
    let sender = derive_address(&seed[..], 0).unwrap();
    let pushes: Vec<_> = tx.input[0]
        .script_sig
        .instructions()
        .map(|i| i.unwrap())
        .collect();
    assert_eq!(pushes.len(), 2);
    assert_eq!(
        hex::encode(pushes[1].push_bytes().unwrap().as_bytes()),
        sender.public_key
    );
}

#[tokio::test]
async fn test_send_with_change_returns_remainder() {
    let registry = imported_registry();
    let chain = MockChain::funded(100_000_000, funding_tx(100_000_000, FIRST_ADDRESS));
    let mut flow = SendFlow::new(10_000_000, ChangePolicy::ReturnToSender);

    let receipt = flow
        .run(&registry, &chain, send_request(50_000_000))
        .await
        .unwrap();

    let tx = decode_transaction_hex(&receipt.raw_hex).unwrap();
    assert_eq!(tx.output.len(), 2);
    assert_eq!(tx.output[1].value.to_sat(), 50_000_000);
    assert_eq!(
        tx.output[1].script_pubkey,
        address_to_script_pubkey(FIRST_ADDRESS).unwrap()
    );
    assert_eq!(receipt.fee_sat, 10_000_000);
    assert!(!receipt.donated);
}

#[tokio::test]
async fn test_amount_at_or_below_fee_never_reaches_network() {
    let registry = imported_registry();
    let chain = MockChain::funded(100_000_000, funding_tx(100_000_000, FIRST_ADDRESS));
    let mut flow = SendFlow::default();

    for amount in [0, 5_000_000, 10_000_000] {
        let err = flow
            .run(&registry, &chain, send_request(amount))
            .await
            .unwrap_err();
        assert_eq!(err, WalletError::AmountBelowFee { fee: 10_000_000 });
        assert!(!flow.trace().contains(&SendState::FetchingUtxo));
    }
    assert!(chain.unspent_queries.lock().is_empty());
    assert!(chain.broadcasts.lock().is_empty());
}

#[tokio::test]
async fn test_insufficient_funds_reports_balance() {
    let registry = imported_registry();
    let chain = MockChain::funded(20_000_000, funding_tx(100_000_000, FIRST_ADDRESS));
    let mut flow = SendFlow::default();

    let err = flow
        .run(&registry, &chain, send_request(50_000_000))
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::InsufficientFunds { available: 20_000_000 });
    assert_eq!(
        err.to_string(),
        "Not sufficient funds. Available: 20000000 minor units"
    );
    assert!(chain.unspent_queries.lock().is_empty());
}

#[tokio::test]
async fn test_broadcast_rejection_is_verbatim() {
    let registry = imported_registry();
    let mut chain = MockChain::funded(100_000_000, funding_tx(100_000_000, FIRST_ADDRESS));
    chain.reject_with = Some("bad-txns-inputs-missingorspent".into());
    let mut flow = SendFlow::default();

    let err = flow
        .run(&registry, &chain, send_request(50_000_000))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WalletError::BroadcastRejected("bad-txns-inputs-missingorspent".into())
    );
    assert_eq!(flow.state(), SendState::Failed);
    assert_eq!(flow.trace()[flow.trace().len() - 2], SendState::Broadcasting);
}

#[tokio::test]
async fn test_utxo_owned_by_someone_else_fails_signing() {
    let registry = imported_registry();
    let chain = MockChain::funded(100_000_000, funding_tx(100_000_000, DESTINATION));
    let mut flow = SendFlow::default();

    let err = flow
        .run(&registry, &chain, send_request(50_000_000))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::TransactionFailed(_)));
    assert!(chain.broadcasts.lock().is_empty());
}

#[tokio::test]
async fn test_send_from_second_account_queries_its_address() {
    let mut registry = imported_registry();
    let second = registry.add_account(None).unwrap();
    registry.select_account(0).unwrap();

    let chain = MockChain::funded(100_000_000, funding_tx(100_000_000, &second.address));
    let mut flow = SendFlow::default();
    let mut request = send_request(50_000_000);
    request.from_index = Some(1);

    flow.run(&registry, &chain, request).await.unwrap();
    assert_eq!(chain.unspent_queries.lock()[0].0, second.address);
}

// ─── Read path ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_balance_and_price_refresh() {
    let mut registry = imported_registry();
    let chain = MockChain::funded(123_456_789, funding_tx(1, FIRST_ADDRESS));

    assert_eq!(registry.update_balance(&chain).await.unwrap(), 123_456_789);
    assert_eq!(registry.state().balance_sat(), Some(123_456_789));
    registry.update_price_usd(&chain).await.unwrap();
    assert_eq!(registry.state().price_usd(), Some(0.0000042));
}
