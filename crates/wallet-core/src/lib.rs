pub mod address;
pub mod config;
pub mod error;
pub mod explorer;
pub mod hd_derivation;
pub mod mnemonic;
pub mod registry;
pub mod send;
pub mod session;
pub mod state;
pub mod store;
pub mod types;

pub use config::WalletConfig;
pub use error::WalletError;
pub use explorer::{ChainClient, HttpExplorerClient};
pub use registry::AccountRegistry;
pub use send::{SendFlow, SendReceipt, SendRequest, SendState};
pub use session::AuthSession;
pub use state::WalletState;
pub use store::{EncryptedStore, FieldRead, FileBackend, MemoryBackend, StoreBackend};
pub use types::{Account, DerivedAddress, NodeEntry};
