//! Asynchronous key/value storage shared by the cache and the credential store.
//!
//! Values are plain JSON so callers decide their own schema; a value that no longer
//! matches it is the caller's problem (the cache treats it as a miss).

use std::{
    collections::HashMap,
    path::{
        Path,
        PathBuf,
    },
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::CardStatsError;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads every present key; absent keys are simply missing from the map.
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Value>, CardStatsError>;

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), CardStatsError>;

    /// Returns how many of the keys existed.
    async fn remove(&self, keys: &[String]) -> Result<usize, CardStatsError>;

    async fn entries_with_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, CardStatsError>;

    async fn get(&self, key: &str) -> Result<Option<Value>, CardStatsError> {
        let mut found = self.get_many(&[key.to_string()]).await?;
        Ok(found.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), CardStatsError> {
        self.set_many(vec![(key.to_string(), value)]).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CardStatsError> {
        Ok(self.entries_with_prefix(prefix).await?.into_iter().map(|(k, _)| k).collect())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Value>, CardStatsError> {
        let entries = self.entries.read().await;
        Ok(keys.iter().filter_map(|k| entries.get(k).map(|v| (k.clone(), v.clone()))).collect())
    }

    async fn set_many(&self, new_entries: Vec<(String, Value)>) -> Result<(), CardStatsError> {
        self.entries.write().await.extend(new_entries);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<usize, CardStatsError> {
        let mut entries = self.entries.write().await;
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count())
    }

    async fn entries_with_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, CardStatsError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Key/value store persisted as a single JSON object. Every mutation rewrites the
/// file; the whole map is kept in memory.
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, Value>>,
}

impl JsonFileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CardStatsError> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<HashMap<String, Value>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Store file {} is corrupt, starting empty: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!("Opened store {} with {} entries", path.display(), entries.len());
        Ok(Self { path, entries: RwLock::new(entries) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, entries: &HashMap<String, Value>) -> Result<(), CardStatsError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string(entries)?;

        // Write to a sibling file first so a crash never leaves a truncated store.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Value>, CardStatsError> {
        let entries = self.entries.read().await;
        Ok(keys.iter().filter_map(|k| entries.get(k).map(|v| (k.clone(), v.clone()))).collect())
    }

    async fn set_many(&self, new_entries: Vec<(String, Value)>) -> Result<(), CardStatsError> {
        if new_entries.is_empty() {
            return Ok(());
        }
        let mut entries = self.entries.write().await;
        entries.extend(new_entries);
        self.flush(&entries).await
    }

    async fn remove(&self, keys: &[String]) -> Result<usize, CardStatsError> {
        let mut entries = self.entries.write().await;
        let removed = keys.iter().filter(|k| entries.remove(*k).is_some()).count();
        if removed > 0 {
            self.flush(&entries).await?;
        }
        Ok(removed)
    }

    async fn entries_with_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, CardStatsError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
