//! In-memory content storage, used by unit and integration tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::models::key::StoreKey;
use crate::storage::{normalize_dir, normalize_path, ContentStorage, ListEntry};

/// [`ContentStorage`] over a path map per store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<StoreKey, BTreeMap<String, Bytes>>>,
    fail_put_pattern: RwLock<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` whose path contains `pattern` fail with a
    /// storage error. Lets tests drive partial copy failures.
    pub async fn fail_puts_matching(&self, pattern: impl Into<String>) {
        *self.fail_put_pattern.write().await = Some(pattern.into());
    }

    /// Clear any injected `put` failure.
    pub async fn clear_put_failures(&self) {
        *self.fail_put_pattern.write().await = None;
    }

    fn dir_prefix(path: &str) -> Result<String> {
        let dir = normalize_dir(path)?;
        if dir.is_empty() {
            Ok(dir)
        } else {
            Ok(format!("{dir}/"))
        }
    }
}

#[async_trait]
impl ContentStorage for MemoryStorage {
    async fn list_dir(&self, key: &StoreKey, path: &str) -> Result<Vec<ListEntry>> {
        let prefix = Self::dir_prefix(path)?;
        let files = self.files.read().await;
        let Some(store) = files.get(key) else {
            return Ok(Vec::new());
        };

        let mut entries = BTreeSet::new();
        for file_path in store.keys() {
            let rest = if prefix.is_empty() {
                file_path.as_str()
            } else {
                match file_path.strip_prefix(&prefix) {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            match rest.split_once('/') {
                Some((segment, _)) => {
                    entries.insert(ListEntry::dir(segment.to_string()));
                }
                None => {
                    entries.insert(ListEntry::file(rest.to_string()));
                }
            }
        }
        Ok(entries.into_iter().collect())
    }

    async fn get(&self, key: &StoreKey, path: &str) -> Result<Option<Bytes>> {
        let path = normalize_path(path)?;
        Ok(self.files.read().await.get(key).and_then(|store| store.get(&path).cloned()))
    }

    async fn put(&self, key: &StoreKey, path: &str, data: Bytes) -> Result<()> {
        let path = normalize_path(path)?;
        if let Some(pattern) = self.fail_put_pattern.read().await.as_deref() {
            if path.contains(pattern) {
                return Err(AppError::Storage(format!(
                    "injected write failure for {path}"
                )));
            }
        }
        self.files
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .insert(path, data);
        Ok(())
    }

    async fn delete(&self, key: &StoreKey, path: &str) -> Result<bool> {
        let path = normalize_path(path)?;
        Ok(self
            .files
            .write()
            .await
            .get_mut(key)
            .map(|store| store.remove(&path).is_some())
            .unwrap_or(false))
    }

    async fn exists(&self, key: &StoreKey, path: &str) -> Result<bool> {
        let path = normalize_path(path)?;
        Ok(self
            .files
            .read()
            .await
            .get(key)
            .map(|store| store.contains_key(&path))
            .unwrap_or(false))
    }
}
