//! Session key cache
//!
//! Keeps the unlocked master key in memory and a device-encrypted copy in
//! the local storage area, so a restarted background process can pick the
//! session up again until it expires. The master key itself is never
//! written in cleartext.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::crypto::{decrypt, encrypt, hash_string, MasterKey};
use crate::error::{LoginError, Result};
use crate::storage::StorageArea;

/// Local storage key for the device-encrypted master key
pub const ENCRYPTED_MASTER_KEY: &str = "encryptedMasterKey";
/// Local storage key for the session expiry (Unix millis)
pub const MASTER_KEY_EXPIRE_TIME: &str = "masterKeyExpireTime";
/// Local storage key for the per-installation device key
pub const DEVICE_FINGERPRINT: &str = "deviceFingerprint";
/// Local storage key for the installation timestamp
pub const INSTALL_TIME: &str = "installTime";

/// Default session duration: 8 hours
pub const DEFAULT_SESSION_TIMEOUT_MS: i64 = 8 * 60 * 60 * 1000;

/// Used in place of the environment fingerprint when nothing can be read
const ENVIRONMENT_SENTINEL: &str = "serviceWorker";

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Best-effort description of the host environment
fn environment_fingerprint() -> String {
    let parts: Vec<String> = ["LANG", "TZ", "HOSTNAME"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .filter(|value| !value.is_empty())
        .collect();

    if parts.is_empty() {
        return ENVIRONMENT_SENTINEL.to_string();
    }

    format!(
        "{}{}{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        parts.concat()
    )
}

/// Persists the master key under a device-bound key with an expiry
pub struct SessionKeyStore {
    /// Local (non-synced) storage area
    local: Arc<dyn StorageArea>,
    /// Identifier of the extension installation
    extension_id: String,
}

impl SessionKeyStore {
    /// Create a store over the local storage area
    pub fn new(local: Arc<dyn StorageArea>, extension_id: impl Into<String>) -> Self {
        Self {
            local,
            extension_id: extension_id.into(),
        }
    }

    /// Get the per-installation device key, creating it on first use.
    ///
    /// The key mixes the extension id, install time, a random salt, the
    /// environment fingerprint, the current time and fresh randomness
    /// through [`hash_string`]. Once stored it never changes.
    pub async fn derive_device_key(&self) -> Result<String> {
        if let Some(Value::String(existing)) = self.local.get(DEVICE_FINGERPRINT).await? {
            if !existing.is_empty() {
                return Ok(existing);
            }
        }

        let install_time = match self.local.get(INSTALL_TIME).await? {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => now_millis().to_string(),
        };

        let mut salt = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut salt);

        let material = format!(
            "{}{}{}{}{}{}",
            self.extension_id,
            install_time,
            hex::encode(salt),
            environment_fingerprint(),
            now_millis(),
            rand::random::<f64>()
        );
        let fingerprint = hash_string(&material);

        self.local
            .set_many(vec![
                (DEVICE_FINGERPRINT.to_string(), json!(fingerprint)),
                (INSTALL_TIME.to_string(), json!(install_time)),
            ])
            .await?;

        info!("Generated device key for this installation");
        Ok(fingerprint)
    }

    /// Store the master key encrypted under the device key, expiring
    /// `ttl_millis` from now (8 hours when `None`).
    ///
    /// Returns false on any failure.
    pub async fn persist(&self, master_key: &MasterKey, ttl_millis: Option<i64>) -> bool {
        match self.try_persist(master_key, ttl_millis).await {
            Ok(expire_time) => {
                debug!("Persisted session key, expires at {}", expire_time);
                true
            }
            Err(e) => {
                error!("Failed to persist session key: {}", e);
                false
            }
        }
    }

    async fn try_persist(&self, master_key: &MasterKey, ttl_millis: Option<i64>) -> Result<i64> {
        let device_key = self.derive_device_key().await?;
        let encrypted = encrypt(master_key.expose(), &device_key);
        if encrypted == master_key.expose() {
            return Err(LoginError::StorageError(
                "master key cannot be protected by the session cipher".to_string(),
            ));
        }
        let ttl_millis = ttl_millis.unwrap_or(DEFAULT_SESSION_TIMEOUT_MS);
        let expire_time = now_millis().saturating_add(ttl_millis);

        self.local
            .set_many(vec![
                (ENCRYPTED_MASTER_KEY.to_string(), json!(encrypted)),
                (MASTER_KEY_EXPIRE_TIME.to_string(), json!(expire_time)),
            ])
            .await?;

        Ok(expire_time)
    }

    /// Read back the persisted master key.
    ///
    /// Expired entries are purged here; there is no background timer.
    pub async fn load(&self) -> Option<MasterKey> {
        self.load_entry().await.map(|(key, _)| key)
    }

    /// Like [`load`](Self::load), with the expiry (Unix millis)
    async fn load_entry(&self) -> Option<(MasterKey, i64)> {
        match self.try_load().await {
            Ok(entry) => entry,
            Err(e) => {
                error!("Failed to load session key: {}", e);
                None
            }
        }
    }

    async fn try_load(&self) -> Result<Option<(MasterKey, i64)>> {
        let encrypted = match self.local.get(ENCRYPTED_MASTER_KEY).await? {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => return Ok(None),
        };
        let expire_time = match self.local.get(MASTER_KEY_EXPIRE_TIME).await? {
            Some(value) => match value.as_i64() {
                Some(t) if t != 0 => t,
                _ => return Ok(None),
            },
            None => return Ok(None),
        };

        if now_millis() > expire_time {
            debug!("Session key expired, removing it");
            self.local
                .remove(&[ENCRYPTED_MASTER_KEY, MASTER_KEY_EXPIRE_TIME])
                .await?;
            return Ok(None);
        }

        let device_key = self.derive_device_key().await?;
        Ok(MasterKey::new(decrypt(&encrypted, &device_key)).map(|key| (key, expire_time)))
    }

    /// Remove the persisted master key and its expiry
    pub async fn clear(&self) -> bool {
        match self
            .local
            .remove(&[ENCRYPTED_MASTER_KEY, MASTER_KEY_EXPIRE_TIME])
            .await
        {
            Ok(()) => {
                debug!("Cleared persisted session key");
                true
            }
            Err(e) => {
                error!("Failed to clear session key: {}", e);
                false
            }
        }
    }
}

/// The unlocked master key and when it was set
#[derive(Debug, Clone)]
pub struct SessionKey {
    pub key: MasterKey,
    pub set_time: DateTime<Utc>,
}

impl SessionKey {
    fn now(key: MasterKey) -> Self {
        Self {
            key,
            set_time: Utc::now(),
        }
    }

    /// `set_time` as Unix millis
    pub fn set_time_millis(&self) -> i64 {
        self.set_time.timestamp_millis()
    }
}

/// In-memory session state owned by the background context.
///
/// All mutation goes through `&mut self`, so the owner's message loop is
/// the single writer. The in-memory key expires at the same time as the
/// persisted copy.
pub struct Session {
    current: Option<SessionKey>,
    /// Unix millis after which `current` is dropped
    expires_at: i64,
    store: SessionKeyStore,
}

impl Session {
    /// Create an empty session backed by `store`
    pub fn new(store: SessionKeyStore) -> Self {
        Self {
            current: None,
            expires_at: 0,
            store,
        }
    }

    /// Get the persistence layer
    pub fn store(&self) -> &SessionKeyStore {
        &self.store
    }

    /// Set the master key and persist a device-encrypted copy.
    ///
    /// Returns whether the copy was persisted. The in-memory key is set
    /// either way; when persisting fails the previous copy is removed, so a
    /// restart can never bring back an older key.
    pub async fn set(&mut self, key: MasterKey, ttl_millis: Option<i64>) -> bool {
        let persisted = self.store.persist(&key, ttl_millis).await;
        if !persisted && !self.store.clear().await {
            error!("A previous session key may still be persisted");
        }

        let ttl = ttl_millis.unwrap_or(DEFAULT_SESSION_TIMEOUT_MS);
        self.expires_at = now_millis().saturating_add(ttl);
        self.current = Some(SessionKey::now(key));
        info!("Master key set for this session");
        persisted
    }

    /// Get the session key, rehydrating it from storage when memory is empty.
    ///
    /// An expired key is cleared here, in memory and in storage.
    pub async fn current(&mut self) -> Option<SessionKey> {
        if self.current.is_some() && now_millis() > self.expires_at {
            info!("Session key expired");
            self.clear().await;
            return None;
        }

        if self.current.is_none() {
            if let Some((key, expire_time)) = self.store.load_entry().await {
                info!("Restored master key from persisted session");
                self.current = Some(SessionKey::now(key));
                self.expires_at = expire_time;
            }
        }
        self.current.clone()
    }

    /// Forget the key in memory and in storage
    pub async fn clear(&mut self) -> bool {
        self.current = None;
        let cleared = self.store.clear().await;
        info!("Master key cleared");
        cleared
    }
}
