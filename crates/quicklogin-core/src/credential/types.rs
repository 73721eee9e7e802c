//! Credential record definitions
//!
//! Records are stored in the same camelCase JSON shape the extension has
//! always written, so existing `accounts` collections load unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Which pages a record applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Any page on the same origin or hostname
    #[default]
    Domain,
    /// Pages on the same origin whose path overlaps the record's path
    Path,
}

/// One stored site credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Opaque identifier, assigned at creation
    #[serde(default)]
    pub id: String,

    /// Origin, or origin plus path, the record applies to
    #[serde(default)]
    pub url: String,

    /// Plaintext in memory, ciphertext when `encrypted` is set
    #[serde(default)]
    pub username: String,

    /// Plaintext in memory, ciphertext when `encrypted` is set
    #[serde(default)]
    pub password: String,

    /// CSS selector hint for the username field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_selector: Option<String>,

    /// CSS selector hint for the password field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_selector: Option<String>,

    #[serde(default)]
    pub match_mode: MatchMode,

    /// Whether `username`/`password` hold ciphertext
    #[serde(default)]
    pub encrypted: bool,

    /// Set by a decrypt pass; `None` on records that were never decrypted.
    /// Cleared before a record is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decryption_failed: Option<bool>,

    /// Fields written by other extension versions, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CredentialRecord {
    /// Create a plaintext record with a fresh id
    pub fn new(url: &str, username: &str, password: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            username_selector: None,
            password_selector: None,
            match_mode: MatchMode::default(),
            encrypted: false,
            decryption_failed: None,
            extra: Map::new(),
        }
    }

    /// Set the match mode (builder style)
    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// Whether the last decrypt pass recovered neither field
    pub fn is_decryption_failed(&self) -> bool {
        self.decryption_failed.unwrap_or(false)
    }

    /// Copy suitable for the persisted collection
    pub(crate) fn for_storage(mut self) -> Self {
        self.decryption_failed = None;
        self
    }
}
