//! In-memory storage area

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::StorageArea;
use crate::error::{LoginError, Result};

/// Storage area backed by a map, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryArea {
    entries: RwLock<HashMap<String, Value>>,
    read_only: AtomicBool,
}

impl MemoryArea {
    /// Create an empty area
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, to exercise storage failures
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(LoginError::StorageError(
                "Storage area is read-only".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageArea for MemoryArea {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        self.check_writable()?;
        self.entries.write().await.extend(entries);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        self.check_writable()?;
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }

    fn area_name(&self) -> &'static str {
        "Memory"
    }
}
