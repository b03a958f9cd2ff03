//! Source-tree walking and the default path filters for promotion.
//!
//! The walk uses raw listings so group virtual entries never become copy
//! candidates. The default exclusions drop maven metadata files and
//! checksum sidecars; each class is independently re-includable per
//! request. Candidate-set assembly (explicit paths vs. filtered walk) and
//! its memoization live on `services::validation::ValidationRequest`.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, PromotionError, Result};
use crate::models::StoreKey;
use crate::services::content_gateway::ContentGateway;

static METADATA_PATHS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+/)?maven-metadata\.xml(\.(md5|sha[0-9]+))?$").expect("metadata filter regex")
});

static CHECKSUM_PATHS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.+\.(md5|sha[0-9]+)$").expect("checksum filter regex"));

/// Whether `path` is a maven metadata document (or one of its checksums),
/// at any depth including the store root.
pub fn is_metadata_path(path: &str) -> bool {
    METADATA_PATHS.is_match(path)
}

/// Whether `path` is a checksum sidecar (`.md5`, `.sha1`, `.sha256`, ...).
pub fn is_checksum_path(path: &str) -> bool {
    CHECKSUM_PATHS.is_match(path)
}

/// Apply the default exclusions to `paths`, honoring the re-include flags.
pub fn filter_paths(
    paths: &BTreeSet<String>,
    include_metadata: bool,
    include_checksums: bool,
) -> BTreeSet<String> {
    paths
        .iter()
        .filter(|p| include_metadata || !is_metadata_path(p))
        .filter(|p| include_checksums || !is_checksum_path(p))
        .cloned()
        .collect()
}

/// Every file path under `source`, walked recursively over raw listings so
/// group virtual entries never appear. Listing failures surface as
/// promotion infrastructure errors; no partial set is returned.
pub async fn source_paths(
    gateway: &ContentGateway,
    source: &StoreKey,
) -> Result<BTreeSet<String>> {
    let mut files = BTreeSet::new();
    let mut dirs = vec![String::new()];
    while let Some(dir) = dirs.pop() {
        let entries = gateway
            .list(source, &dir, true)
            .await
            .map_err(|e| AppError::Promotion(PromotionError::listing(source, e.to_string())))?;
        for entry in entries {
            let path = if dir.is_empty() {
                entry.name
            } else {
                format!("{dir}/{}", entry.name)
            };
            if entry.directory {
                dirs.push(path);
            } else {
                files.insert(path);
            }
        }
    }
    Ok(files)
}
