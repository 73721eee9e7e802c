//! Account queries and CRUD over the synced `accounts` collection
//!
//! Every operation reads the whole collection, works on it in memory and
//! writes it back in a single storage call, so a failure before the write
//! leaves the stored collection untouched.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cipher::CredentialCipher;
use super::types::CredentialRecord;
use crate::crypto::MasterKey;
use crate::error::{LoginError, Result};
use crate::storage::StorageArea;
use crate::url_match;

/// Synced storage key holding the account array
pub const ACCOUNTS_KEY: &str = "accounts";

/// Serves decrypted, URL-filtered accounts and edits the stored collection
pub struct CredentialMatchService {
    /// Synced storage area
    storage: Arc<dyn StorageArea>,
}

impl CredentialMatchService {
    /// Create a service over the synced storage area
    pub fn new(storage: Arc<dyn StorageArea>) -> Self {
        Self { storage }
    }

    /// Load the stored (encrypted) collection.
    ///
    /// A missing entry, or one that is not an array, reads as empty.
    pub async fn stored_records(&self) -> Result<Vec<CredentialRecord>> {
        match self.storage.get(ACCOUNTS_KEY).await? {
            Some(value @ Value::Array(_)) => Ok(serde_json::from_value(value)?),
            Some(_) => {
                warn!("Stored accounts entry is not an array, treating it as empty");
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn store_records(&self, records: Vec<CredentialRecord>) -> Result<()> {
        let count = records.len();
        let records: Vec<CredentialRecord> =
            records.into_iter().map(CredentialRecord::for_storage).collect();

        self.storage
            .set(ACCOUNTS_KEY, serde_json::to_value(records)?)
            .await?;

        debug!("Stored {} accounts in {} storage", count, self.storage.area_name());
        Ok(())
    }

    /// Decrypted accounts usable for autofill on `target_url`.
    ///
    /// Accounts that fail to decrypt are left out here but still show up
    /// in [`get_all_credentials`](Self::get_all_credentials).
    pub async fn get_matching_credentials(
        &self,
        key: Option<&MasterKey>,
        target_url: &str,
    ) -> Result<Vec<CredentialRecord>> {
        let key = key.ok_or(LoginError::NoMasterKey)?;

        let cipher = CredentialCipher::with_key(key.clone());
        let decrypted = cipher.decrypt_accounts(self.stored_records().await?);
        let matching = url_match::filter_by_url(decrypted, target_url, true);

        debug!("{} accounts match {}", matching.len(), target_url);
        Ok(matching)
    }

    /// Every account decrypted, with `decryption_failed` markers kept
    pub async fn get_all_credentials(
        &self,
        key: Option<&MasterKey>,
    ) -> Result<Vec<CredentialRecord>> {
        let key = key.ok_or(LoginError::NoMasterKey)?;

        let cipher = CredentialCipher::with_key(key.clone());
        let decrypted = cipher.decrypt_accounts(self.stored_records().await?);

        debug!("Decrypted {} accounts", decrypted.len());
        Ok(decrypted)
    }

    /// Number of stored accounts whose URL applies to `target_url`.
    ///
    /// Works on the stored records, so no key is needed.
    pub async fn count_matching(&self, target_url: &str) -> Result<usize> {
        let records = self.stored_records().await?;
        Ok(url_match::count_matches(&records, target_url))
    }

    /// Add a new account, encrypting it when a key is active.
    ///
    /// An empty id is replaced by a fresh one. Returns the stored id.
    pub async fn save_account(
        &self,
        key: Option<&MasterKey>,
        record: CredentialRecord,
    ) -> Result<String> {
        let mut records = self.stored_records().await?;

        let mut record = record;
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        if records.iter().any(|r| r.id == record.id) {
            return Err(LoginError::DuplicateAccount(record.id));
        }

        let id = record.id.clone();
        records.push(Self::prepare(key, record));
        self.store_records(records).await?;

        info!("Added account: {}", id);
        Ok(id)
    }

    /// Replace the account with the same id, encrypting it when a key is active
    pub async fn update_account(
        &self,
        key: Option<&MasterKey>,
        record: CredentialRecord,
    ) -> Result<()> {
        let mut records = self.stored_records().await?;

        let index = records
            .iter()
            .position(|r| r.id == record.id)
            .ok_or_else(|| LoginError::AccountNotFound(record.id.clone()))?;

        let id = record.id.clone();
        records[index] = Self::prepare(key, record);
        self.store_records(records).await?;

        info!("Updated account: {}", id);
        Ok(())
    }

    /// Plaintext records are encrypted under `key`; records already marked
    /// encrypted are stored as given.
    fn prepare(key: Option<&MasterKey>, record: CredentialRecord) -> CredentialRecord {
        match key {
            Some(key) if !record.encrypted => {
                CredentialCipher::with_key(key.clone()).encrypt_account(record)
            }
            _ => record,
        }
    }

    /// Delete an account. Deleting an unknown id succeeds.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let records = self.stored_records().await?;
        let before = records.len();

        let remaining: Vec<CredentialRecord> =
            records.into_iter().filter(|r| r.id != id).collect();

        if remaining.len() == before {
            debug!("Account {} not present, nothing to delete", id);
        }

        self.store_records(remaining).await?;

        info!("Deleted account: {}", id);
        Ok(())
    }

    /// Re-encrypt the whole collection from `old_key` to `new_key`.
    ///
    /// `current` is the active session key and must equal `old_key`. The
    /// collection is written once, after every record has been processed.
    pub async fn rotate_key(
        &self,
        current: Option<&MasterKey>,
        old_key: &MasterKey,
        new_key: &MasterKey,
    ) -> Result<()> {
        let current = current.ok_or(LoginError::NoMasterKey)?;
        if current != old_key {
            return Err(LoginError::MasterKeyMismatch);
        }

        let records = self.stored_records().await?;
        let count = records.len();

        let mut cipher = CredentialCipher::with_key(current.clone());
        let rotated = cipher.reencrypt_accounts(records, old_key, new_key);

        self.store_records(rotated).await?;

        info!("Master key changed, re-encrypted {} accounts", count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::MatchMode;
    use crate::storage::{JsonFileArea, MemoryArea};
    use serde_json::json;
    use tempfile::TempDir;

    fn key(s: &str) -> MasterKey {
        MasterKey::new(s).unwrap()
    }

    fn service() -> (CredentialMatchService, Arc<MemoryArea>) {
        let area = Arc::new(MemoryArea::new());
        (CredentialMatchService::new(area.clone()), area)
    }

    #[tokio::test]
    async fn test_save_encrypts_before_storing() {
        let (service, area) = service();
        let k = key("correct-key");

        let id = service
            .save_account(Some(&k), CredentialRecord::new("https://bank.com", "alice", "p@ss"))
            .await
            .unwrap();

        let stored = area.get(ACCOUNTS_KEY).await.unwrap().unwrap();
        let stored: Vec<CredentialRecord> = serde_json::from_value(stored).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert!(stored[0].encrypted);
        assert_ne!(stored[0].username, "alice");
        assert_ne!(stored[0].password, "p@ss");
    }

    #[tokio::test]
    async fn test_save_without_key_stores_plaintext() {
        let (service, _) = service();

        service
            .save_account(None, CredentialRecord::new("https://a.com", "u", "p"))
            .await
            .unwrap();

        let stored = service.stored_records().await.unwrap();
        assert!(!stored[0].encrypted);
        assert_eq!(stored[0].password, "p");
    }

    #[tokio::test]
    async fn test_save_assigns_id_and_rejects_duplicates() {
        let (service, _) = service();

        let mut record = CredentialRecord::new("https://a.com", "u", "p");
        record.id = String::new();
        let id = service.save_account(None, record).await.unwrap();
        assert!(!id.is_empty());

        let mut duplicate = CredentialRecord::new("https://b.com", "u", "p");
        duplicate.id = id.clone();
        assert!(matches!(
            service.save_account(None, duplicate).await,
            Err(LoginError::DuplicateAccount(d)) if d == id
        ));
    }

    #[tokio::test]
    async fn test_bank_scenario() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync.json");
        let correct = key("correct-key");

        {
            let service = CredentialMatchService::new(Arc::new(JsonFileArea::new(&path, "sync")));
            let record = CredentialRecord::new("https://bank.com", "alice", "p@ss");
            service.save_account(Some(&correct), record).await.unwrap();
        }

        let service = CredentialMatchService::new(Arc::new(JsonFileArea::new(&path, "sync")));

        let all = service.get_all_credentials(Some(&correct)).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].username, "alice");
        assert_eq!(all[0].password, "p@ss");
        assert!(!all[0].is_decryption_failed());

        let all = service.get_all_credentials(Some(&key("wrong-key"))).await.unwrap();
        assert_eq!(all[0].username, "");
        assert_eq!(all[0].password, "");
        assert!(all[0].is_decryption_failed());
    }

    #[tokio::test]
    async fn test_queries_require_a_key() {
        let (service, _) = service();

        assert!(matches!(
            service.get_all_credentials(None).await,
            Err(LoginError::NoMasterKey)
        ));
        assert!(matches!(
            service.get_matching_credentials(None, "https://a.com").await,
            Err(LoginError::NoMasterKey)
        ));
    }

    #[tokio::test]
    async fn test_matching_excludes_failed_decryptions() {
        let (service, _) = service();
        let k = key("k");

        service
            .save_account(Some(&k), CredentialRecord::new("https://a.com", "mine", "pw"))
            .await
            .unwrap();
        let theirs = CredentialRecord::new("https://a.com", "theirs", "pw");
        service.save_account(Some(&key("other")), theirs).await.unwrap();
        service
            .save_account(
                Some(&k),
                CredentialRecord::new("https://a.com/admin", "admin", "pw")
                    .with_match_mode(MatchMode::Path),
            )
            .await
            .unwrap();

        let matching = service
            .get_matching_credentials(Some(&k), "https://a.com/login")
            .await
            .unwrap();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].username, "mine");

        let all = service.get_all_credentials(Some(&k)).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[1].is_decryption_failed());
    }

    #[tokio::test]
    async fn test_update_account() {
        let (service, _) = service();
        let k = key("k");

        let id = service
            .save_account(Some(&k), CredentialRecord::new("https://a.com", "u", "old"))
            .await
            .unwrap();

        let mut edited = service.get_all_credentials(Some(&k)).await.unwrap().remove(0);
        edited.password = "new".to_string();
        edited.encrypted = false;
        edited.decryption_failed = None;
        service.update_account(Some(&k), edited).await.unwrap();

        let all = service.get_all_credentials(Some(&k)).await.unwrap();
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].password, "new");
    }

    #[tokio::test]
    async fn test_update_missing_account() {
        let (service, _) = service();

        let result = service
            .update_account(None, CredentialRecord::new("https://a.com", "u", "p"))
            .await;
        assert!(matches!(result, Err(LoginError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (service, _) = service();

        let id = service
            .save_account(None, CredentialRecord::new("https://a.com", "u", "p"))
            .await
            .unwrap();
        let before = service.stored_records().await.unwrap();

        service.remove("no-such-id").await.unwrap();
        assert_eq!(service.stored_records().await.unwrap(), before);

        service.remove(&id).await.unwrap();
        assert!(service.stored_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rotate_key() {
        let (service, _) = service();
        let old = key("old-key");
        let new = key("new-key");

        service
            .save_account(Some(&old), CredentialRecord::new("https://a.com", "alice", "one"))
            .await
            .unwrap();
        let strangers = CredentialRecord::new("https://b.com", "bob", "two");
        service.save_account(Some(&key("stranger")), strangers).await.unwrap();
        let foreign = service.stored_records().await.unwrap()[1].clone();

        service.rotate_key(Some(&old), &old, &new).await.unwrap();

        let all = service.get_all_credentials(Some(&new)).await.unwrap();
        assert_eq!(all[0].username, "alice");
        assert_eq!(all[0].password, "one");

        // undecryptable record kept verbatim
        assert_eq!(service.stored_records().await.unwrap()[1], foreign);
    }

    #[tokio::test]
    async fn test_rotate_key_requires_matching_session_key() {
        let (service, _) = service();
        let old = key("old");

        assert!(matches!(
            service.rotate_key(None, &old, &key("new")).await,
            Err(LoginError::NoMasterKey)
        ));
        assert!(matches!(
            service.rotate_key(Some(&key("other")), &old, &key("new")).await,
            Err(LoginError::MasterKeyMismatch)
        ));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_collection() {
        let (service, area) = service();
        let old = key("old");

        service
            .save_account(Some(&old), CredentialRecord::new("https://a.com", "u", "p"))
            .await
            .unwrap();
        let before = service.stored_records().await.unwrap();

        area.set_read_only(true);
        assert!(service.rotate_key(Some(&old), &old, &key("new")).await.is_err());
        assert_eq!(service.stored_records().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_non_array_collection_reads_as_empty() {
        let (service, area) = service();
        area.set(ACCOUNTS_KEY, json!({"not": "an array"})).await.unwrap();

        assert!(service.stored_records().await.unwrap().is_empty());
        assert!(service.get_all_credentials(Some(&key("k"))).await.unwrap().is_empty());
    }
}
