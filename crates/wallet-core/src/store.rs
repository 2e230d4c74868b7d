//! Encrypted key-value persistence for wallet fields.
//!
//! Values are sealed with the application key and written by a background
//! task in the order the setters ran. Reads go straight to the backend and
//! only observe writes that have been flushed.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crypto_utils::encryption::{open_hex, seal_hex};
use crypto_utils::AppKey;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::WalletError;

/// Field names used in the store.
pub mod keys {
    pub const SEED_PHRASE: &str = "seedPhrase";
    pub const WALLET: &str = "wallet";
    pub const WALLET_LIST: &str = "walletList";
    pub const NAME_LIST: &str = "nameList";
    pub const NODE_LIST: &str = "nodeList";
    pub const NODE_NAME_LIST: &str = "nodeNameList";
    pub const VISIBLE_WALLET_LIST: &str = "visibleWalletList";
    pub const SELECTED_WALLET_INDEX: &str = "selectedWalletIndex";
    pub const SELECTED_NODE_INDEX: &str = "selectedNodeIndex";
    pub const PASSWORD: &str = "password";
    pub const NAME: &str = "name";
    pub const TOKEN: &str = "token";
    pub const TOKEN_EXPIRATION: &str = "tokenExpiration";
    pub const INPUT_WORDS_BACKUP: &str = "inputWordsBackup";
}

/// Raw storage of hex ciphertexts keyed by field name.
pub trait StoreBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, WalletError>;
    fn set(&self, key: &str, value: &str) -> Result<(), WalletError>;
    fn remove(&self, key: &str) -> Result<(), WalletError>;
}

/// Process-local backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    fields: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, WalletError> {
        Ok(self.fields.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WalletError> {
        self.fields.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), WalletError> {
        self.fields.write().remove(key);
        Ok(())
    }
}

/// Single JSON object on disk, rewritten through a temp file on each change.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, WalletError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(WalletError::Storage(format!(
                    "read {}: {e}",
                    self.path.display()
                )))
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| WalletError::Storage(format!("parse {}: {e}", self.path.display())))
    }

    fn write_all(&self, fields: &BTreeMap<String, String>) -> Result<(), WalletError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WalletError::Storage(format!("create {}: {e}", parent.display())))?;
        }
        let json = serde_json::to_string_pretty(fields)
            .map_err(|e| WalletError::Storage(format!("serialize: {e}")))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| WalletError::Storage(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| WalletError::Storage(format!("rename {}: {e}", tmp.display())))
    }
}

impl StoreBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, WalletError> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WalletError> {
        let _guard = self.lock.lock();
        let mut fields = self.read_all()?;
        fields.insert(key.to_string(), value.to_string());
        self.write_all(&fields)
    }

    fn remove(&self, key: &str) -> Result<(), WalletError> {
        let _guard = self.lock.lock();
        let mut fields = self.read_all()?;
        if fields.remove(key).is_some() {
            self.write_all(&fields)?;
        }
        Ok(())
    }
}

/// Outcome of reading one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRead {
    /// Never written, or removed.
    Absent,
    /// Stored bytes that do not open under the current key. Holds the raw
    /// stored text for diagnostics.
    Corrupt(String),
    Present(String),
}

impl FieldRead {
    /// The main read path: anything but a clean value is "no value".
    pub fn into_option(self) -> Option<String> {
        match self {
            FieldRead::Present(value) => Some(value),
            FieldRead::Absent | FieldRead::Corrupt(_) => None,
        }
    }
}

enum WriteCommand {
    Set { key: String, sealed: String },
    Remove { key: String },
    Flush(oneshot::Sender<()>),
}

/// Encrypting front of a [`StoreBackend`]. Cheap to clone; clones share the
/// backend and the writer task.
#[derive(Clone)]
pub struct EncryptedStore {
    backend: Arc<dyn StoreBackend>,
    key: Arc<AppKey>,
    writer: mpsc::UnboundedSender<WriteCommand>,
}

impl EncryptedStore {
    /// Wrap `backend` and start the writer task on the current runtime.
    pub fn open(backend: Arc<dyn StoreBackend>, key: AppKey) -> Result<Self, WalletError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| WalletError::Storage(format!("no async runtime for store writer: {e}")))?;

        let (writer, rx) = mpsc::unbounded_channel();
        handle.spawn(run_writer(Arc::clone(&backend), rx));

        Ok(Self {
            backend,
            key: Arc::new(key),
            writer,
        })
    }

    /// Store over a fresh [`MemoryBackend`].
    pub fn in_memory(key: AppKey) -> Result<Self, WalletError> {
        Self::open(Arc::new(MemoryBackend::new()), key)
    }

    /// Queue a write of `value` under `key`; `None` removes the field.
    ///
    /// Never fails. Sealing or queueing problems are logged and the field is
    /// left as it was.
    pub fn save_field(&self, key: &str, value: Option<&str>) {
        let command = match value {
            Some(value) => match seal_hex(value, &self.key) {
                Ok(sealed) => WriteCommand::Set {
                    key: key.to_string(),
                    sealed,
                },
                Err(e) => {
                    warn!(field = key, error = %e, "failed to seal field, not persisted");
                    return;
                }
            },
            None => WriteCommand::Remove {
                key: key.to_string(),
            },
        };
        if self.writer.send(command).is_err() {
            warn!(field = key, "store writer stopped, field not persisted");
        }
    }

    /// Queue removal of several fields.
    pub fn remove_fields(&self, keys: &[&str]) {
        for key in keys {
            self.save_field(key, None);
        }
    }

    /// Read and open one field, distinguishing the failure modes.
    pub fn load_field_detailed(&self, key: &str) -> FieldRead {
        let stored = match self.backend.get(key) {
            Ok(Some(stored)) => stored,
            Ok(None) => return FieldRead::Absent,
            Err(e) => {
                warn!(field = key, error = %e, "store read failed");
                return FieldRead::Absent;
            }
        };
        match open_hex(&stored, &self.key) {
            Ok(value) => FieldRead::Present(value),
            Err(e) => {
                debug!(field = key, error = %e, "stored field does not open");
                FieldRead::Corrupt(stored)
            }
        }
    }

    /// Read one field; absent and unreadable both come back as `None`.
    pub fn load_field(&self, key: &str) -> Option<String> {
        self.load_field_detailed(key).into_option()
    }

    /// Wait until every write queued before this call has reached the backend.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.writer.send(WriteCommand::Flush(tx)).is_err() {
            warn!("store writer stopped, nothing to flush");
            return;
        }
        let _ = rx.await;
    }
}

async fn run_writer(backend: Arc<dyn StoreBackend>, mut rx: mpsc::UnboundedReceiver<WriteCommand>) {
    while let Some(command) = rx.recv().await {
        let (key, result) = match command {
            WriteCommand::Flush(done) => {
                let _ = done.send(());
                continue;
            }
            WriteCommand::Set { key, sealed } => {
                let backend = Arc::clone(&backend);
                let field = key.clone();
                let result =
                    tokio::task::spawn_blocking(move || backend.set(&field, &sealed)).await;
                (key, result)
            }
            WriteCommand::Remove { key } => {
                let backend = Arc::clone(&backend);
                let field = key.clone();
                let result = tokio::task::spawn_blocking(move || backend.remove(&field)).await;
                (key, result)
            }
        };
        match result {
            Ok(Ok(())) => debug!(field = %key, "field persisted"),
            Ok(Err(e)) => warn!(field = %key, error = %e, "failed to persist field"),
            Err(e) => warn!(field = %key, error = %e, "store write task panicked"),
        }
    }
    debug!("store writer finished");
}
