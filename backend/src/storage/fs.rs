//! Filesystem-backed content storage.
//!
//! Layout: `{root}/{packageType}/{storeType}/{name}/{store-relative path}`,
//! e.g. `storage/maven/hosted/releases/org/acme/app/1.0/app-1.0.jar`.
//!
//! Writes land in a temp file next to the target and are renamed into place,
//! so a concurrent reader sees either the old bytes or the new bytes, never
//! a torn file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::key::StoreKey;
use crate::storage::{normalize_dir, normalize_path, ContentStorage, ListEntry};

/// Local-disk [`ContentStorage`] backend.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn store_root(&self, key: &StoreKey) -> PathBuf {
        self.root
            .join(key.package_type().as_str())
            .join(key.store_type().as_str())
            .join(key.name())
    }

    fn resolve(&self, key: &StoreKey, path: &str) -> Result<PathBuf> {
        let rel = normalize_path(path)?;
        Ok(self.store_root(key).join(rel))
    }

    fn resolve_dir(&self, key: &StoreKey, path: &str) -> Result<PathBuf> {
        let rel = normalize_dir(path)?;
        Ok(self.store_root(key).join(rel))
    }

    /// Remove directories left empty by a delete, up to (not including) the
    /// store root.
    async fn prune_empty_parents(&self, key: &StoreKey, removed: &Path) {
        let store_root = self.store_root(key);
        let mut dir = removed.parent().map(Path::to_path_buf);
        while let Some(d) = dir {
            if d == store_root || !d.starts_with(&store_root) {
                break;
            }
            // remove_dir refuses non-empty directories, which ends the walk.
            if tokio::fs::remove_dir(&d).await.is_err() {
                break;
            }
            dir = d.parent().map(Path::to_path_buf);
        }
    }
}

#[async_trait]
impl ContentStorage for FsStorage {
    async fn list_dir(&self, key: &StoreKey, path: &str) -> Result<Vec<ListEntry>> {
        let dir = self.resolve_dir(key, path)?;
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(".tmp-") {
                continue;
            }
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                entries.push(ListEntry::dir(name));
            } else if file_type.is_file() {
                entries.push(ListEntry::file(name));
            }
        }
        entries.sort();
        Ok(entries)
    }

    async fn get(&self, key: &StoreKey, path: &str) -> Result<Option<Bytes>> {
        let full = self.resolve(key, path)?;
        match tokio::fs::read(&full).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &StoreKey, path: &str, data: Bytes) -> Result<()> {
        let full = self.resolve(key, path)?;
        let parent = full
            .parent()
            .ok_or_else(|| AppError::Storage(format!("no parent directory for {path}")))?;
        tokio::fs::create_dir_all(parent).await?;

        let tmp = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &full).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::debug!(store = %key, path, bytes = data.len(), "stored file");
        Ok(())
    }

    async fn delete(&self, key: &StoreKey, path: &str) -> Result<bool> {
        let full = self.resolve(key, path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => {
                self.prune_empty_parents(key, &full).await;
                tracing::debug!(store = %key, path, "deleted file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &StoreKey, path: &str) -> Result<bool> {
        let full = self.resolve(key, path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
