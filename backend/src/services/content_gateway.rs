//! Store-aware content access.
//!
//! Sits between the API/promotion layers and the physical `ContentStorage`:
//! resolves group stores through their ordered constituents (first member
//! wins for reads, union for listings), decorates maven directory listings
//! with virtual `maven-metadata.xml` entries unless the caller asks for the
//! raw view, and synthesizes a version-list metadata document for maven
//! groups when no constituent holds the file.
//!
//! The `raw` flag on [`ContentGateway::list`] is load-bearing: promotion
//! resolves its candidate paths from raw listings so virtual entries never
//! become copy candidates.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{AppError, Result};
use crate::models::{ArtifactStore, PackageType, StoreKey};
use crate::services::store_service::StoreService;
use crate::storage::{
    file_name, normalize_dir, normalize_path, parent_dir, ContentStorage, ListEntry,
};

/// File name of maven repository metadata documents.
pub const MAVEN_METADATA: &str = "maven-metadata.xml";

/// Store-aware view over a [`ContentStorage`].
pub struct ContentGateway {
    stores: Arc<StoreService>,
    storage: Arc<dyn ContentStorage>,
}

impl ContentGateway {
    pub fn new(stores: Arc<StoreService>, storage: Arc<dyn ContentStorage>) -> Self {
        Self { stores, storage }
    }

    /// Fetch a file through a store. Group stores try each constituent in
    /// order and return the first hit; a maven group with no physical
    /// metadata synthesizes a version list.
    pub async fn retrieve(&self, key: &StoreKey, path: &str) -> Result<Option<Bytes>> {
        let path = normalize_path(path)?;
        let store = self.stores.get(key).await?;
        if store.disabled {
            return Ok(None);
        }
        if !store.is_group() {
            return self.storage.get(key, &path).await;
        }

        for member in self.flatten_group(&store).await {
            if let Some(bytes) = self.storage.get(&member, &path).await? {
                return Ok(Some(bytes));
            }
        }
        if key.package_type() == PackageType::Maven && file_name(&path) == MAVEN_METADATA {
            return self.generate_group_metadata(key, &path).await;
        }
        Ok(None)
    }

    /// Whether a file physically exists in the store (for groups, in any
    /// reachable constituent). Virtual metadata does not count.
    pub async fn exists(&self, key: &StoreKey, path: &str) -> Result<bool> {
        let path = normalize_path(path)?;
        let store = self.stores.get(key).await?;
        if store.disabled {
            return Ok(false);
        }
        if !store.is_group() {
            return self.storage.exists(key, &path).await;
        }
        for member in self.flatten_group(&store).await {
            if self.storage.exists(&member, &path).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// List the immediate children of `path`. Group listings are the union
    /// of constituent listings (name conflicts: first constituent wins).
    ///
    /// With `raw` set the listing is exactly what storage holds; otherwise
    /// maven listings gain a virtual `maven-metadata.xml` entry for
    /// directories that have subdirectories but no physical metadata file.
    pub async fn list(&self, key: &StoreKey, path: &str, raw: bool) -> Result<Vec<ListEntry>> {
        let path = normalize_dir(path)?;
        let store = self.stores.get(key).await?;
        if store.disabled {
            return Ok(Vec::new());
        }

        let mut entries = if store.is_group() {
            let mut merged: BTreeMap<String, bool> = BTreeMap::new();
            for member in self.flatten_group(&store).await {
                for entry in self.storage.list_dir(&member, &path).await? {
                    merged.entry(entry.name).or_insert(entry.directory);
                }
            }
            merged
                .into_iter()
                .map(|(name, directory)| ListEntry { name, directory })
                .collect()
        } else {
            self.storage.list_dir(key, &path).await?
        };

        if !raw && key.package_type() == PackageType::Maven {
            decorate_maven_listing(&mut entries);
        }
        Ok(entries)
    }

    /// Write a file into a concrete store. Groups are read-only surfaces.
    pub async fn store(&self, key: &StoreKey, path: &str, data: Bytes) -> Result<()> {
        let store = self.writable(key).await?;
        self.storage.put(&store.key, &normalize_path(path)?, data).await
    }

    /// Delete a file from a concrete store.
    pub async fn delete(&self, key: &StoreKey, path: &str) -> Result<bool> {
        let store = self.writable(key).await?;
        self.storage.delete(&store.key, &normalize_path(path)?).await
    }

    /// The concrete stores reachable from `group`, in resolution order.
    /// Missing constituents are skipped with a warning; disabled ones
    /// silently; a visited set guards against definition cycles.
    pub async fn flatten_group(&self, group: &ArtifactStore) -> Vec<StoreKey> {
        let mut visited: HashSet<StoreKey> = HashSet::new();
        visited.insert(group.key.clone());

        let mut ordered = Vec::new();
        let mut stack: Vec<StoreKey> = group
            .constituents()
            .unwrap_or(&[])
            .iter()
            .rev()
            .cloned()
            .collect();
        while let Some(next) = stack.pop() {
            if !visited.insert(next.clone()) {
                continue;
            }
            let Some(store) = self.stores.try_get(&next).await else {
                tracing::warn!(group = %group.key, member = %next, "skipping missing group constituent");
                continue;
            };
            if store.disabled {
                continue;
            }
            match store.constituents() {
                Some(members) => stack.extend(members.iter().rev().cloned()),
                None => ordered.push(next),
            }
        }
        ordered
    }

    async fn writable(&self, key: &StoreKey) -> Result<ArtifactStore> {
        let store = self.stores.get(key).await?;
        if store.is_group() {
            return Err(AppError::Validation(format!(
                "cannot write through group {key}; target a concrete store"
            )));
        }
        if store.disabled {
            return Err(AppError::Conflict(format!("store {key} is disabled")));
        }
        Ok(store)
    }

    /// Version-list metadata for a maven group, derived from the version
    /// directories under the artifact directory. Returns `None` when the
    /// path does not sit under `groupId/artifactId` coordinates or no
    /// version directory qualifies.
    async fn generate_group_metadata(&self, key: &StoreKey, path: &str) -> Result<Option<Bytes>> {
        let artifact_dir = parent_dir(path);
        let group_dir = parent_dir(artifact_dir);
        if artifact_dir.is_empty() || group_dir.is_empty() {
            return Ok(None);
        }

        let mut versions = Vec::new();
        for entry in self.list(key, artifact_dir, true).await? {
            if !entry.directory
                || !entry.name.chars().next().is_some_and(|c| c.is_ascii_digit())
            {
                continue;
            }
            let version_dir = format!("{artifact_dir}/{}", entry.name);
            let has_files = self
                .list(key, &version_dir, true)
                .await?
                .iter()
                .any(|e| !e.directory);
            if has_files {
                versions.push(entry.name);
            }
        }
        if versions.is_empty() {
            return Ok(None);
        }
        versions.sort_by(|a, b| compare_versions(a, b));

        let group_id = group_dir.replace('/', ".");
        let artifact_id = file_name(artifact_dir);
        let xml = render_version_metadata(&group_id, artifact_id, &versions)?;
        Ok(Some(Bytes::from(xml)))
    }
}

fn decorate_maven_listing(entries: &mut Vec<ListEntry>) {
    let has_subdir = entries.iter().any(|e| e.directory);
    let has_metadata = entries.iter().any(|e| !e.directory && e.name == MAVEN_METADATA);
    if has_subdir && !has_metadata {
        entries.push(ListEntry::file(MAVEN_METADATA));
        entries.sort();
    }
}

/// Segment-wise version ordering: numeric segments compare numerically,
/// everything else lexically. Good enough to pick `latest`/`release`.
fn compare_versions(a: &str, b: &str) -> Ordering {
    let segments = |s: &str| -> Vec<String> {
        s.split(['.', '-']).map(str::to_string).collect()
    };
    let (a, b) = (segments(a), segments(b));
    for (left, right) in a.iter().zip(b.iter()) {
        let ord = match (left.parse::<u64>(), right.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => left.cmp(right),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn render_version_metadata(
    group_id: &str,
    artifact_id: &str,
    versions: &[String],
) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("metadata")))?;
    text_element(&mut writer, "groupId", group_id)?;
    text_element(&mut writer, "artifactId", artifact_id)?;
    writer.write_event(Event::Start(BytesStart::new("versioning")))?;
    if let Some(latest) = versions.last() {
        text_element(&mut writer, "latest", latest)?;
    }
    if let Some(release) = versions.iter().rev().find(|v| !v.ends_with("-SNAPSHOT")) {
        text_element(&mut writer, "release", release)?;
    }
    writer.write_event(Event::Start(BytesStart::new("versions")))?;
    for version in versions {
        text_element(&mut writer, "version", version)?;
    }
    writer.write_event(Event::End(BytesEnd::new("versions")))?;
    text_element(
        &mut writer,
        "lastUpdated",
        &chrono::Utc::now().format("%Y%m%d%H%M%S").to_string(),
    )?;
    writer.write_event(Event::End(BytesEnd::new("versioning")))?;
    writer.write_event(Event::End(BytesEnd::new("metadata")))?;
    Ok(writer.into_inner())
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
