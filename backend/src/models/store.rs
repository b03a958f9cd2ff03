//! Store definitions: remote, hosted, and group stores.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::key::{PackageType, StoreKey, StoreType};

/// Per-type configuration of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreSpec {
    /// Proxies an upstream registry. The URL is recorded for provenance;
    /// content is served from the local cache area only.
    Remote { url: String },
    /// Accepts direct uploads.
    Hosted {
        #[serde(default)]
        allow_snapshots: bool,
        #[serde(default = "default_true")]
        allow_releases: bool,
    },
    /// Aggregates other stores; reads resolve through `constituents` in order.
    Group {
        #[schema(value_type = Vec<String>)]
        constituents: Vec<StoreKey>,
    },
}

fn default_true() -> bool {
    true
}

impl StoreSpec {
    /// The store type this spec belongs with.
    pub fn store_type(&self) -> StoreType {
        match self {
            Self::Remote { .. } => StoreType::Remote,
            Self::Hosted { .. } => StoreType::Hosted,
            Self::Group { .. } => StoreType::Group,
        }
    }
}

/// A named repository: remote proxy, hosted upload target, or group.
///
/// Definitions are persisted as JSON documents by the store service; the
/// `key`'s store type always agrees with the `spec` variant (enforced on
/// create/update).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ArtifactStore {
    #[schema(value_type = String, example = "maven:hosted:releases")]
    pub key: StoreKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    pub spec: StoreSpec,
}

impl ArtifactStore {
    /// A hosted store with release uploads enabled and snapshots disabled.
    pub fn hosted(package_type: PackageType, name: &str) -> Self {
        let key = StoreKey::new(package_type, StoreType::Hosted, name)
            .unwrap_or_else(|e| panic!("invalid hosted store name: {e}"));
        Self {
            key,
            description: None,
            disabled: false,
            spec: StoreSpec::Hosted {
                allow_snapshots: false,
                allow_releases: true,
            },
        }
    }

    /// A remote store recording the given upstream URL.
    pub fn remote(package_type: PackageType, name: &str, url: impl Into<String>) -> Self {
        let key = StoreKey::new(package_type, StoreType::Remote, name)
            .unwrap_or_else(|e| panic!("invalid remote store name: {e}"));
        Self {
            key,
            description: None,
            disabled: false,
            spec: StoreSpec::Remote { url: url.into() },
        }
    }

    /// A group over the given ordered constituents.
    pub fn group(package_type: PackageType, name: &str, constituents: Vec<StoreKey>) -> Self {
        let key = StoreKey::new(package_type, StoreType::Group, name)
            .unwrap_or_else(|e| panic!("invalid group store name: {e}"));
        Self {
            key,
            description: None,
            disabled: false,
            spec: StoreSpec::Group { constituents },
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Allow snapshot uploads on a hosted store.
    pub fn with_snapshots(mut self) -> Self {
        if let StoreSpec::Hosted {
            allow_snapshots, ..
        } = &mut self.spec
        {
            *allow_snapshots = true;
        }
        self
    }

    pub fn is_hosted(&self) -> bool {
        self.key.store_type() == StoreType::Hosted
    }

    pub fn is_group(&self) -> bool {
        self.key.store_type() == StoreType::Group
    }

    /// Group constituents, or `None` for non-group stores.
    pub fn constituents(&self) -> Option<&[StoreKey]> {
        match &self.spec {
            StoreSpec::Group { constituents } => Some(constituents),
            _ => None,
        }
    }

    /// Whether the key's store type and the spec variant agree.
    pub fn is_consistent(&self) -> bool {
        self.key.store_type() == self.spec.store_type()
    }
}
