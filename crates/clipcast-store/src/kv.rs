//! Key-addressed state store.
//!
//! Keys look like relative paths (`sources/v1`, `clips/v1-c00`). The file
//! implementation writes a temp file in the target directory and renames it
//! into place, so a crash mid-write never leaves a torn record. A state
//! transition is only observable once its durable write completed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreResult;

/// Key-addressed store with atomic whole-value writes.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_raw(&self, key: &str) -> StoreResult<Option<String>>;
    async fn store_raw(&self, key: &str, value: String) -> StoreResult<()>;
    async fn remove(&self, key: &str) -> StoreResult<()>;
    /// List keys beginning with `prefix`. `prefix` must contain the
    /// directory part of the keys it matches (e.g. `clips/v1-c`).
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// Per-entity async locks, serializing read-modify-write cycles per key.
///
/// Registry entries lock per source, ledger entries per clip, so concurrent
/// clip workers of the same source cannot lose updates.
#[derive(Default)]
pub struct EntityLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        entry.lock_owned().await
    }
}

/// One JSON document per key under a root directory.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load_raw(&self, key: &str) -> StoreResult<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store_raw(&self, key: &str, value: String) -> StoreResult<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write-then-rename keeps the committed record whole under crashes.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(key = key, "persisted record");
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let (dir_part, name_prefix) = match prefix.rfind('/') {
            Some(pos) => (&prefix[..pos], &prefix[pos + 1..]),
            None => ("", prefix),
        };
        let dir = self.root.join(dir_part);
        let mut keys = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(".json") {
                if stem.starts_with(name_prefix) {
                    if dir_part.is_empty() {
                        keys.push(stem.to_string());
                    } else {
                        keys.push(format!("{}/{}", dir_part, stem));
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-memory store for tests and embedding.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_raw(&self, key: &str) -> StoreResult<Option<String>> {
        let map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(key).cloned())
    }

    async fn store_raw(&self, key: &str, value: String) -> StoreResult<()> {
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = map
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        assert!(store.load_raw("sources/v1").await.unwrap().is_none());
        store
            .store_raw("sources/v1", "{\"a\":1}".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.load_raw("sources/v1").await.unwrap().unwrap(),
            "{\"a\":1}"
        );

        // Survives a fresh handle over the same directory.
        let reopened = JsonFileStore::new(dir.path());
        assert!(reopened.load_raw("sources/v1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_store_overwrite_is_whole_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        store
            .store_raw("sources/v1", "{\"long\":\"record value\"}".to_string())
            .await
            .unwrap();
        store
            .store_raw("sources/v1", "{\"b\":2}".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.load_raw("sources/v1").await.unwrap().unwrap(),
            "{\"b\":2}"
        );
        // No temp file left behind.
        let tmp = dir.path().join("sources/v1.json.tmp");
        assert!(!tmp.exists());
    }

    #[tokio::test]
    async fn test_file_store_list_keys_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        for key in ["clips/v1-c00", "clips/v1-c01", "clips/v12-c00"] {
            store.store_raw(key, "{}".to_string()).await.unwrap();
        }
        let keys = store.list_keys("clips/v1-c").await.unwrap();
        assert_eq!(keys, vec!["clips/v1-c00", "clips/v1-c01"]);
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.remove("sources/nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_matches_contract() {
        let store = MemoryStore::new();
        store.store_raw("clips/a-c00", "{}".into()).await.unwrap();
        store.store_raw("clips/a-c01", "{}".into()).await.unwrap();
        assert_eq!(
            store.list_keys("clips/a-c").await.unwrap(),
            vec!["clips/a-c00", "clips/a-c01"]
        );
        store.remove("clips/a-c00").await.unwrap();
        assert!(store.load_raw("clips/a-c00").await.unwrap().is_none());
    }
}
