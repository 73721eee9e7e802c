//! Error types for quicklogin-core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, LoginError>;

/// Errors surfaced to callers as `{success: false, error}`.
///
/// Cipher faults are not represented here: encryption falls back to the
/// plaintext and decryption to an empty string.
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("No master key")]
    NoMasterKey,

    #[error("Master key does not match the current session")]
    MasterKeyMismatch,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
