//! Stored site credentials: record shape, record-level encryption and the
//! service that queries and edits the synced collection

mod cipher;
mod service;
mod types;

pub use cipher::CredentialCipher;
pub use service::{CredentialMatchService, ACCOUNTS_KEY};
pub use types::*;
