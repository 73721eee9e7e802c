//! JSON file storage area
//!
//! Each area is a single JSON object on disk. The file is read on first
//! access, cached in memory, and rewritten atomically (temp file + rename)
//! after every mutation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use super::StorageArea;
use crate::error::Result;

/// File format for persistent storage
#[derive(Debug, Default, Serialize, Deserialize)]
struct AreaFile {
    version: u32,
    entries: Map<String, Value>,
}

/// Storage area persisted as a JSON file
pub struct JsonFileArea {
    /// Path to the area file
    path: PathBuf,
    /// Display name of the area ("sync", "local")
    name: &'static str,
    /// Cached entries, `None` until the file has been read
    cache: RwLock<Option<Map<String, Value>>>,
}

impl JsonFileArea {
    /// Open (or lazily create) the area file at `path`
    pub fn new(path: impl Into<PathBuf>, name: &'static str) -> Self {
        Self {
            path: path.into(),
            name,
            cache: RwLock::new(None),
        }
    }

    /// Get the path to the area file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<Map<String, Value>> {
        if !tokio::fs::try_exists(&self.path).await? {
            debug!("No {} storage file at {:?}", self.name, self.path);
            return Ok(Map::new());
        }

        let contents = tokio::fs::read_to_string(&self.path).await?;
        let file: AreaFile = serde_json::from_str(&contents)?;
        debug!("Loaded {} entries from {} storage", file.entries.len(), self.name);
        Ok(file.entries)
    }

    async fn write_file(&self, entries: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = AreaFile {
            version: 1,
            entries: entries.clone(),
        };
        let contents = serde_json::to_string_pretty(&file)?;

        // Write atomically using a temp file
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!("Saved {} entries to {} storage", entries.len(), self.name);
        Ok(())
    }

    /// Apply `mutate` to the entries and persist the result.
    ///
    /// The cache only changes once the file write succeeded.
    async fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Map<String, Value>) + Send,
    {
        let mut cache = self.cache.write().await;

        let mut entries = match cache.as_ref() {
            Some(entries) => entries.clone(),
            None => self.read_file().await?,
        };
        mutate(&mut entries);

        self.write_file(&entries).await?;
        *cache = Some(entries);
        Ok(())
    }

    async fn snapshot(&self) -> Result<Map<String, Value>> {
        if let Some(entries) = self.cache.read().await.as_ref() {
            return Ok(entries.clone());
        }

        let mut cache = self.cache.write().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }
        Ok(cache.clone().unwrap_or_default())
    }
}

#[async_trait]
impl StorageArea for JsonFileArea {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.snapshot().await?.get(key).cloned())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        self.update(move |map| map.extend(entries)).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        self.update(move |map| {
            for key in &keys {
                map.remove(key);
            }
        })
        .await
    }

    fn area_name(&self) -> &'static str {
        self.name
    }
}
