//! # quicklogin-core
//!
//! Core functionality for Quick Login Manager including:
//! - The legacy checksum/XOR cipher used for stored credentials
//! - Domain and path URL matching between accounts and pages
//! - Chrome-style `sync`/`local` storage areas (JSON file or in-memory)
//! - A session key cache that survives background restarts until expiry
//! - The background orchestrator every extension surface talks to

pub mod background;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod session;
pub mod settings;
pub mod storage;
pub mod url_match;

pub use background::{default_data_dir, Background, MasterKeyInfo};
pub use credential::{CredentialCipher, CredentialMatchService, CredentialRecord, MatchMode};
pub use crypto::{decrypt, encrypt, hash_string, MasterKey};
pub use error::{LoginError, Result};
pub use session::{Session, SessionKey, SessionKeyStore};
pub use settings::{Settings, SettingsManager};
pub use storage::{JsonFileArea, MemoryArea, StorageArea};
pub use url_match::TabUrlInfo;
