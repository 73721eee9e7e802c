//! Record-level encryption under the current master key

use tracing::{debug, warn};

use super::types::CredentialRecord;
use crate::crypto::{decrypt, encrypt, MasterKey};

/// Encrypts and decrypts credential records with the active master key.
///
/// Without a key every record operation hands its input back unchanged.
#[derive(Debug, Clone, Default)]
pub struct CredentialCipher {
    master_key: Option<MasterKey>,
}

impl CredentialCipher {
    /// Create a cipher with no master key
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cipher holding `key`
    pub fn with_key(key: MasterKey) -> Self {
        Self {
            master_key: Some(key),
        }
    }

    /// Set or replace the master key
    pub fn set_master_key(&mut self, key: Option<MasterKey>) {
        self.master_key = key;
    }

    /// Forget the master key
    pub fn clear_master_key(&mut self) {
        self.master_key = None;
    }

    /// Check if a master key is set
    pub fn has_master_key(&self) -> bool {
        self.master_key.is_some()
    }

    /// The current master key, if any
    pub fn master_key(&self) -> Option<&MasterKey> {
        self.master_key.as_ref()
    }

    /// Encrypt both secret fields and mark the record encrypted
    pub fn encrypt_account(&self, record: CredentialRecord) -> CredentialRecord {
        let key = match &self.master_key {
            Some(key) => key.expose(),
            None => return record,
        };

        CredentialRecord {
            username: encrypt(&record.username, key),
            password: encrypt(&record.password, key),
            encrypted: true,
            ..record
        }
    }

    /// Decrypt both secret fields of an encrypted record.
    ///
    /// `decryption_failed` is set only when neither field could be
    /// recovered; one empty field on its own is a valid record.
    pub fn decrypt_account(&self, record: CredentialRecord) -> CredentialRecord {
        let key = match &self.master_key {
            Some(key) if record.encrypted => key.expose(),
            _ => return record,
        };

        let username = decrypt(&record.username, key);
        let password = decrypt(&record.password, key);
        let failed = username.is_empty() && password.is_empty();

        if failed {
            debug!("Could not decrypt account {}", record.id);
        }

        CredentialRecord {
            username,
            password,
            decryption_failed: Some(failed),
            ..record
        }
    }

    /// Decrypt a whole collection, keeping order
    pub fn decrypt_accounts(&self, records: Vec<CredentialRecord>) -> Vec<CredentialRecord> {
        records
            .into_iter()
            .map(|record| self.decrypt_account(record))
            .collect()
    }

    /// Move a collection from `old_key` to `new_key`.
    ///
    /// Records that do not decrypt under `old_key` are kept verbatim. The
    /// cipher's own key is left as it was.
    pub fn reencrypt_accounts(
        &mut self,
        records: Vec<CredentialRecord>,
        old_key: &MasterKey,
        new_key: &MasterKey,
    ) -> Vec<CredentialRecord> {
        let previous = self.master_key.take();
        let mut kept = 0usize;

        let result: Vec<CredentialRecord> = records
            .into_iter()
            .map(|record| {
                self.master_key = Some(old_key.clone());
                let decrypted = self.decrypt_account(record.clone());

                if decrypted.is_decryption_failed() {
                    kept += 1;
                    return record;
                }

                self.master_key = Some(new_key.clone());
                self.encrypt_account(CredentialRecord {
                    encrypted: false,
                    decryption_failed: None,
                    ..decrypted
                })
            })
            .collect();

        self.master_key = previous;

        if kept > 0 {
            warn!("{} accounts did not decrypt with the old key and were kept as-is", kept);
        }

        result
    }
}
