//! Physical content storage: trait and backends.
//!
//! A `ContentStorage` holds the bytes for concrete (non-group) stores under
//! `(store key, path)` coordinates. Group resolution, virtual entries, and
//! everything store-definition-aware lives above this seam in
//! `services::content_gateway`.

pub mod digest;
pub mod fs;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{AppError, Result};
use crate::models::key::StoreKey;

pub use fs::FsStorage;
pub use memory::MemoryStorage;

/// One entry in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListEntry {
    /// Entry name within the listed directory (no separators).
    pub name: String,
    pub directory: bool,
}

impl ListEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: true,
        }
    }
}

/// Byte storage for concrete stores.
///
/// Paths are store-relative, `/`-separated, and already normalized (see
/// [`normalize_path`]). Implementations must provide path-level atomicity
/// for `put` — a reader never observes a half-written file.
#[async_trait]
pub trait ContentStorage: Send + Sync {
    /// List the immediate children of `path` (empty string = store root).
    /// A missing directory lists as empty, not as an error.
    async fn list_dir(&self, key: &StoreKey, path: &str) -> Result<Vec<ListEntry>>;

    /// Fetch a file's bytes, or `None` if absent.
    async fn get(&self, key: &StoreKey, path: &str) -> Result<Option<Bytes>>;

    /// Write a file, creating parent directories and replacing any previous
    /// content.
    async fn put(&self, key: &StoreKey, path: &str, data: Bytes) -> Result<()>;

    /// Remove a file. Returns `true` when something was removed; deleting an
    /// absent path is not an error.
    async fn delete(&self, key: &StoreKey, path: &str) -> Result<bool>;

    /// Whether a file exists at `path`.
    async fn exists(&self, key: &StoreKey, path: &str) -> Result<bool>;
}

/// Normalize a content path: strip leading/trailing slashes, collapse empty
/// segments, and reject traversal.
pub fn normalize_path(path: &str) -> Result<String> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(AppError::Validation(format!(
                    "path '{path}' must not contain '..' segments"
                )))
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err(AppError::Validation("empty content path".to_string()));
    }
    Ok(segments.join("/"))
}

/// Like [`normalize_path`], but the empty path is valid and means the store
/// root.
pub fn normalize_dir(path: &str) -> Result<String> {
    if path.split('/').all(|s| s.is_empty() || s == ".") {
        return Ok(String::new());
    }
    normalize_path(path)
}

/// Parent directory of a normalized path ("" for top-level entries).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Final segment of a normalized path.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_slashes() {
        assert_eq!(normalize_path("/org/x/a.jar").unwrap(), "org/x/a.jar");
        assert_eq!(normalize_path("org//x/").unwrap(), "org/x");
        assert_eq!(normalize_path("./org/./x").unwrap(), "org/x");
    }

    #[test]
    fn test_normalize_rejects_traversal() {
        assert!(normalize_path("org/../../etc/passwd").is_err());
        assert!(normalize_path("..").is_err());
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(normalize_path("").is_err());
        assert!(normalize_path("///").is_err());
    }

    #[test]
    fn test_normalize_dir_accepts_root() {
        assert_eq!(normalize_dir("").unwrap(), "");
        assert_eq!(normalize_dir("/").unwrap(), "");
        assert_eq!(normalize_dir("org/x/").unwrap(), "org/x");
        assert!(normalize_dir("../x").is_err());
    }

    #[test]
    fn test_parent_and_file_name() {
        assert_eq!(parent_dir("org/x/a.jar"), "org/x");
        assert_eq!(parent_dir("a.jar"), "");
        assert_eq!(file_name("org/x/a.jar"), "a.jar");
        assert_eq!(file_name("a.jar"), "a.jar");
    }
}
