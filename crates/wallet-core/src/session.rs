use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::{keys, EncryptedStore};

/// Lifetime of an auth token from the moment it is set.
pub const TOKEN_TTL_MS: i64 = 3_600_000;

/// How often the background watcher checks for expiry.
pub const EXPIRY_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

struct AuthToken {
    token: SecretString,
    expires_at_ms: i64,
}

/// Session token shared between the wallet and the expiry watcher.
///
/// Only the token fields are touched here; in-flight sends never observe it.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<Mutex<Option<AuthToken>>>,
    store: EncryptedStore,
}

impl AuthSession {
    pub fn new(store: EncryptedStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            store,
        }
    }

    /// Rebuild from persisted `token` / `tokenExpiration`. A token without a
    /// readable expiry is dropped.
    pub fn restore(store: EncryptedStore) -> Self {
        let token = store.load_field(keys::TOKEN);
        let expiry = store
            .load_field(keys::TOKEN_EXPIRATION)
            .and_then(|raw| raw.trim().parse::<i64>().ok());

        let restored = match (token, expiry) {
            (Some(token), Some(expires_at_ms)) => Some(AuthToken {
                token: SecretString::from(token),
                expires_at_ms,
            }),
            (Some(_), None) => {
                warn!("stored token has no usable expiration, discarding");
                None
            }
            _ => None,
        };

        Self {
            inner: Arc::new(Mutex::new(restored)),
            store,
        }
    }

    /// Install `token`, expiring one hour after `now_ms`. Returns the expiry.
    pub fn set_token(&self, token: &str, now_ms: i64) -> i64 {
        let expires_at_ms = now_ms.saturating_add(TOKEN_TTL_MS);
        // Writes are queued under the lock so the store sees them in memory order.
        let mut guard = self.inner.lock();
        *guard = Some(AuthToken {
            token: SecretString::from(token.to_string()),
            expires_at_ms,
        });
        self.store.save_field(keys::TOKEN, Some(token));
        self.store
            .save_field(keys::TOKEN_EXPIRATION, Some(&expires_at_ms.to_string()));
        expires_at_ms
    }

    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        *guard = None;
        self.store
            .remove_fields(&[keys::TOKEN, keys::TOKEN_EXPIRATION]);
    }

    /// Copy of the current token, if any.
    pub fn token(&self) -> Option<SecretString> {
        self.inner
            .lock()
            .as_ref()
            .map(|t| SecretString::from(t.token.expose_secret().to_string()))
    }

    pub fn expires_at_ms(&self) -> Option<i64> {
        self.inner.lock().as_ref().map(|t| t.expires_at_ms)
    }

    pub fn is_active(&self, now_ms: i64) -> bool {
        matches!(self.expires_at_ms(), Some(exp) if now_ms < exp)
    }

    /// Clear the token when `now_ms` has reached its expiry. Returns whether
    /// it was cleared.
    pub fn expire_if_due(&self, now_ms: i64) -> bool {
        let mut guard = self.inner.lock();
        if !matches!(guard.as_ref(), Some(t) if now_ms >= t.expires_at_ms) {
            return false;
        }
        *guard = None;
        self.store
            .remove_fields(&[keys::TOKEN, keys::TOKEN_EXPIRATION]);
        true
    }

    /// Check for expiry every `period` until the handle is aborted.
    pub fn spawn_expiry_watcher(&self, period: Duration) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if session.expire_if_due(now_ms()) {
                    info!("session token expired and was cleared");
                } else {
                    debug!("session token check");
                }
            }
        })
    }
}
