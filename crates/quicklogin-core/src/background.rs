//! Background orchestration
//!
//! `Background` is the single owner of the session key and the only writer
//! to the account collection. Popups, the content script and the settings
//! page all reach it through the host's message loop, one message at a time.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::credential::{CredentialMatchService, CredentialRecord};
use crate::crypto::MasterKey;
use crate::error::{LoginError, Result};
use crate::session::{Session, SessionKeyStore};
use crate::settings::{Settings, SettingsManager};
use crate::storage::{JsonFileArea, StorageArea};
use crate::url_match::TabUrlInfo;

/// Extension id used when neither the command line nor settings give one
pub const DEFAULT_EXTENSION_ID: &str = "quick-login-manager";

/// File backing the synced storage area
pub const SYNC_FILE: &str = "sync.json";
/// File backing the local storage area
pub const LOCAL_FILE: &str = "local.json";

/// Get the default data directory for this user
pub fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("com", "quick-login", "quick-login-manager")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| LoginError::StorageError("Could not determine data directory".to_string()))
}

/// Answer to `getMasterKey`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterKeyInfo {
    pub master_key: Option<String>,
    pub has_key: bool,
    /// Unix millis
    pub set_time: Option<i64>,
}

/// Owns the session, the account service and the settings
pub struct Background {
    accounts: CredentialMatchService,
    session: Session,
    settings: SettingsManager,
    data_dir: Option<PathBuf>,
}

impl Background {
    /// Open the file-backed storage areas under `data_dir`.
    ///
    /// `extension_id` overrides the one in settings.
    pub fn open(data_dir: &Path, extension_id: Option<String>) -> Self {
        let settings = SettingsManager::new(data_dir);
        let sync: Arc<dyn StorageArea> =
            Arc::new(JsonFileArea::new(data_dir.join(SYNC_FILE), "sync"));
        let local: Arc<dyn StorageArea> =
            Arc::new(JsonFileArea::new(data_dir.join(LOCAL_FILE), "local"));

        info!("Opening storage in {:?}", data_dir);

        let mut background = Self::with_areas(sync, local, settings, extension_id);
        background.data_dir = Some(data_dir.to_path_buf());
        background
    }

    /// Build over explicit storage areas (in-memory areas in tests)
    pub fn with_areas(
        sync: Arc<dyn StorageArea>,
        local: Arc<dyn StorageArea>,
        settings: SettingsManager,
        extension_id: Option<String>,
    ) -> Self {
        let extension_id = extension_id
            .or_else(|| settings.get().extension_id.clone())
            .unwrap_or_else(|| DEFAULT_EXTENSION_ID.to_string());
        debug!("Using extension id {}", extension_id);

        Self {
            accounts: CredentialMatchService::new(sync),
            session: Session::new(SessionKeyStore::new(local, extension_id)),
            settings,
            data_dir: None,
        }
    }

    /// Directory holding the storage files, when file-backed
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Get current settings
    pub fn settings(&self) -> &Settings {
        self.settings.get()
    }

    /// Get the settings manager
    pub fn settings_manager(&mut self) -> &mut SettingsManager {
        &mut self.settings
    }

    async fn current_key(&mut self) -> Option<MasterKey> {
        self.session.current().await.map(|s| s.key)
    }

    /// `setMasterKey`: unlock the session.
    ///
    /// `session_timeout` is in milliseconds and defaults to the configured
    /// timeout. An empty key clears the session instead. A session copy
    /// that cannot be persisted is logged; the key is still held in memory.
    pub async fn set_master_key(&mut self, master_key: &str, session_timeout: Option<i64>) {
        let key = match MasterKey::new(master_key) {
            Some(key) => key,
            None => {
                debug!("Empty master key, clearing the session");
                self.session.clear().await;
                return;
            }
        };

        let ttl = session_timeout.unwrap_or_else(|| self.settings.get().session_timeout_ms());
        if !self.session.set(key, Some(ttl)).await {
            warn!("Session key is held in memory only");
        }
    }

    /// `getMasterKey`
    pub async fn master_key_info(&mut self) -> MasterKeyInfo {
        match self.session.current().await {
            Some(session) => MasterKeyInfo {
                master_key: Some(session.key.expose().to_string()),
                has_key: true,
                set_time: Some(session.set_time_millis()),
            },
            None => MasterKeyInfo {
                master_key: None,
                has_key: false,
                set_time: None,
            },
        }
    }

    /// `clearMasterKey`: returns whether the persisted copy was removed
    pub async fn clear_master_key(&mut self) -> bool {
        self.session.clear().await
    }

    /// `getDecryptedAccounts`
    pub async fn decrypted_accounts(&mut self, url: &str) -> Result<Vec<CredentialRecord>> {
        let key = self.current_key().await;
        self.accounts.get_matching_credentials(key.as_ref(), url).await
    }

    /// `getAllDecryptedAccounts`
    pub async fn all_decrypted_accounts(&mut self) -> Result<Vec<CredentialRecord>> {
        let key = self.current_key().await;
        self.accounts.get_all_credentials(key.as_ref()).await
    }

    /// `getAccounts`: the stored records, still encrypted
    pub async fn stored_accounts(&self) -> Result<Vec<CredentialRecord>> {
        self.accounts.stored_records().await
    }

    /// `countMatchingAccounts`
    pub async fn count_matching_accounts(&self, url: &str) -> Result<usize> {
        self.accounts.count_matching(url).await
    }

    /// `saveAccount`: returns the stored id
    pub async fn save_account(&mut self, record: CredentialRecord) -> Result<String> {
        let key = self.current_key().await;
        self.accounts.save_account(key.as_ref(), record).await
    }

    /// `updateAccount`
    pub async fn update_account(&mut self, record: CredentialRecord) -> Result<()> {
        let key = self.current_key().await;
        self.accounts.update_account(key.as_ref(), record).await
    }

    /// `deleteAccount`
    pub async fn delete_account(&mut self, id: &str) -> Result<()> {
        self.accounts.remove(id).await
    }

    /// `changeMasterKey`: re-encrypt every account under `new_master_key`,
    /// then switch the session over to it.
    ///
    /// The session key only changes once the collection has been written.
    pub async fn change_master_key(&mut self, new_master_key: &str) -> Result<()> {
        let new_key = MasterKey::new(new_master_key)
            .ok_or_else(|| LoginError::InvalidRequest("New master key is empty".to_string()))?;
        let current = self.current_key().await.ok_or(LoginError::NoMasterKey)?;

        self.accounts
            .rotate_key(Some(&current), &current, &new_key)
            .await?;

        let ttl = self.settings.get().session_timeout_ms();
        if !self.session.set(new_key, Some(ttl)).await {
            warn!("Session key is held in memory only");
        }

        Ok(())
    }

    /// `getTabUrlInfo`
    pub fn tab_url_info(&self, url: Option<&str>) -> TabUrlInfo {
        TabUrlInfo::from_url(url)
    }
}
