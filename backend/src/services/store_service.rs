//! Store definition management.
//!
//! Definitions live as one JSON document per store under
//! `{data_dir}/stores/{packageType}/{storeType}/{name}.json` and are mirrored
//! in memory. Mutations write through to disk and publish domain events.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use walkdir::WalkDir;

use crate::error::{AppError, Result};
use crate::models::{ArtifactStore, PackageType, StoreKey, StoreSpec, StoreType};
use crate::services::event_bus::EventBus;

/// Service managing store definitions.
pub struct StoreService {
    dir: PathBuf,
    events: Arc<EventBus>,
    cache: RwLock<HashMap<StoreKey, ArtifactStore>>,
}

impl StoreService {
    /// Open the definition directory and index every `*.json` under it.
    /// Documents that fail to parse are skipped with a warning.
    pub fn open(dir: impl Into<PathBuf>, events: Arc<EventBus>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut cache = HashMap::new();
        for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file()
                || entry.path().extension().is_none_or(|ext| ext != "json")
            {
                continue;
            }
            let raw = std::fs::read(entry.path())?;
            match serde_json::from_slice::<ArtifactStore>(&raw) {
                Ok(store) if store.is_consistent() => {
                    cache.insert(store.key.clone(), store);
                }
                Ok(store) => {
                    tracing::warn!(
                        path = %entry.path().display(),
                        key = %store.key,
                        "skipping definition whose key and spec disagree"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        path = %entry.path().display(),
                        error = %e,
                        "skipping unreadable store definition"
                    );
                }
            }
        }
        tracing::info!(count = cache.len(), dir = %dir.display(), "loaded store definitions");

        Ok(Self {
            dir,
            events,
            cache: RwLock::new(cache),
        })
    }

    /// All definitions, ordered by key.
    pub async fn list(&self) -> Vec<ArtifactStore> {
        let cache = self.cache.read().await;
        let mut stores: Vec<ArtifactStore> = cache.values().cloned().collect();
        stores.sort_by(|a, b| a.key.cmp(&b.key));
        stores
    }

    /// Definitions for one package type, ordered by key.
    pub async fn list_by_package(&self, package_type: PackageType) -> Vec<ArtifactStore> {
        let mut stores = self.list().await;
        stores.retain(|s| s.key.package_type() == package_type);
        stores
    }

    /// Look up a definition, or `None` when absent.
    pub async fn try_get(&self, key: &StoreKey) -> Option<ArtifactStore> {
        self.cache.read().await.get(key).cloned()
    }

    /// Look up a definition, failing with `NotFound` when absent.
    pub async fn get(&self, key: &StoreKey) -> Result<ArtifactStore> {
        self.try_get(key)
            .await
            .ok_or_else(|| AppError::NotFound(format!("store {key}")))
    }

    /// Create a new definition. Fails with `Conflict` if the key is taken.
    pub async fn create(&self, store: ArtifactStore) -> Result<ArtifactStore> {
        let mut cache = self.cache.write().await;
        if cache.contains_key(&store.key) {
            return Err(AppError::Conflict(format!("store {} already exists", store.key)));
        }
        Self::validate(&cache, &store)?;
        self.persist(&store).await?;
        cache.insert(store.key.clone(), store.clone());
        drop(cache);

        self.events.emit("store.created", &store.key);
        Ok(store)
    }

    /// Replace an existing definition. Fails with `NotFound` if absent.
    pub async fn update(&self, store: ArtifactStore) -> Result<ArtifactStore> {
        let mut cache = self.cache.write().await;
        if !cache.contains_key(&store.key) {
            return Err(AppError::NotFound(format!("store {}", store.key)));
        }
        Self::validate(&cache, &store)?;
        self.persist(&store).await?;
        cache.insert(store.key.clone(), store.clone());
        drop(cache);

        self.events.emit("store.updated", &store.key);
        Ok(store)
    }

    /// Remove a definition. Groups that listed it keep the dangling key;
    /// resolution skips missing constituents.
    pub async fn delete(&self, key: &StoreKey) -> Result<()> {
        let mut cache = self.cache.write().await;
        if cache.remove(key).is_none() {
            return Err(AppError::NotFound(format!("store {key}")));
        }
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        drop(cache);

        self.events.emit("store.deleted", key);
        Ok(())
    }

    /// Append `member` to a group's constituents. Returns `false` when it was
    /// already present.
    pub async fn add_constituent(&self, group: &StoreKey, member: &StoreKey) -> Result<bool> {
        self.mutate_constituents(group, |constituents| {
            if constituents.contains(member) {
                false
            } else {
                constituents.push(member.clone());
                true
            }
        })
        .await
    }

    /// Remove `member` from a group's constituents. Returns `false` when it
    /// was not a member.
    pub async fn remove_constituent(&self, group: &StoreKey, member: &StoreKey) -> Result<bool> {
        self.mutate_constituents(group, |constituents| {
            let before = constituents.len();
            constituents.retain(|k| k != member);
            constituents.len() != before
        })
        .await
    }

    /// Groups whose constituent list names `member`, ordered by key.
    pub async fn groups_containing(&self, member: &StoreKey) -> Vec<ArtifactStore> {
        let cache = self.cache.read().await;
        let mut groups: Vec<ArtifactStore> = cache
            .values()
            .filter(|s| {
                s.constituents()
                    .map(|c| c.contains(member))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.key.cmp(&b.key));
        groups
    }

    async fn mutate_constituents(
        &self,
        group: &StoreKey,
        mutate: impl FnOnce(&mut Vec<StoreKey>) -> bool,
    ) -> Result<bool> {
        let mut cache = self.cache.write().await;
        let mut store = cache
            .get(group)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("store {group}")))?;

        let StoreSpec::Group { constituents } = &mut store.spec else {
            return Err(AppError::Validation(format!("{group} is not a group")));
        };
        if !mutate(constituents) {
            return Ok(false);
        }

        Self::validate(&cache, &store)?;
        self.persist(&store).await?;
        cache.insert(store.key.clone(), store);
        drop(cache);

        self.events.emit("store.updated", group);
        Ok(true)
    }

    fn path_for(&self, key: &StoreKey) -> PathBuf {
        self.dir
            .join(key.package_type().as_str())
            .join(key.store_type().as_str())
            .join(format!("{}.json", key.name()))
    }

    async fn persist(&self, store: &ArtifactStore) -> Result<()> {
        let path = self.path_for(&store.key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(store)?;
        tokio::fs::write(&path, json).await?;
        Ok(())
    }

    /// Definition-level checks: key/spec agreement, same-package groups, and
    /// no membership cycles. Constituents may reference stores that do not
    /// exist yet; those are skipped at resolution time.
    fn validate(cache: &HashMap<StoreKey, ArtifactStore>, store: &ArtifactStore) -> Result<()> {
        if !store.is_consistent() {
            return Err(AppError::Validation(format!(
                "store {} has a {} spec",
                store.key,
                store.spec.store_type()
            )));
        }

        if let StoreSpec::Remote { url } = &store.spec {
            url::Url::parse(url).map_err(|e| {
                AppError::Validation(format!(
                    "store {} has an invalid upstream url '{url}': {e}",
                    store.key
                ))
            })?;
        }

        let Some(constituents) = store.constituents() else {
            return Ok(());
        };
        for member in constituents {
            if member.package_type() != store.key.package_type() {
                return Err(AppError::Validation(format!(
                    "group {} cannot contain {}: package types differ",
                    store.key, member
                )));
            }
        }

        // Depth-first walk over group edges, with the pending change applied.
        let mut stack: Vec<&StoreKey> = constituents.iter().collect();
        let mut visited = std::collections::HashSet::new();
        while let Some(next) = stack.pop() {
            if next == &store.key {
                return Err(AppError::Validation(format!(
                    "group {} would contain itself",
                    store.key
                )));
            }
            if !visited.insert(next.clone()) || next.store_type() != StoreType::Group {
                continue;
            }
            if let Some(sub) = cache.get(next).and_then(|s| s.constituents()) {
                stack.extend(sub.iter());
            }
        }
        Ok(())
    }
}
