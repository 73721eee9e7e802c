//! Storage trait definitions

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A key/value storage area holding JSON values.
///
/// Mirrors the shape of the browser's `storage.sync` / `storage.local`
/// areas: every call is awaited, and a failed write is reported to the
/// caller rather than retried.
#[async_trait]
pub trait StorageArea: Send + Sync {
    /// Read a value by key
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write several values in one operation
    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()>;

    /// Remove the given keys; missing keys are ignored
    async fn remove(&self, keys: &[&str]) -> Result<()>;

    /// Get a human-readable name for this storage area
    fn area_name(&self) -> &'static str;

    /// Write a single value
    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.set_many(vec![(key.to_string(), value)]).await
    }
}
