//! Built-in validation rules.
//!
//! A rule inspects the shared [`ValidationRequest`] and either passes
//! (`Ok(None)`), rejects with a message (`Ok(Some(_))`), or fails to
//! execute (`Err(_)`), which aborts the whole validation attempt.
//!
//! Rule mappings refer to these implementations by catalog id; with no
//! mapping files present the whole catalog is registered under its
//! canonical ids.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::services::path_resolver::{is_checksum_path, is_metadata_path};
use crate::services::validation::ValidationRequest;

/// A single promotion validation rule.
#[async_trait]
pub trait ValidationRule: Send + Sync {
    /// Catalog identifier, e.g. `no-snapshot-paths`.
    fn id(&self) -> &'static str;

    /// One-line description shown in admin listings.
    fn description(&self) -> &'static str;

    async fn validate(&self, request: &ValidationRequest) -> Result<Option<String>>;
}

/// Instantiate a built-in by catalog id. `parameters` lets a rule mapping
/// fix defaults (currently `versionPattern`).
pub fn build_rule(
    id: &str,
    parameters: &BTreeMap<String, String>,
) -> Option<Arc<dyn ValidationRule>> {
    match id {
        "no-snapshot-paths" => Some(Arc::new(NoSnapshotPaths)),
        "project-version-pattern" => Some(Arc::new(ProjectVersionPattern {
            default_pattern: parameters.get("versionPattern").cloned(),
        })),
        "parsable-pom" => Some(Arc::new(ParsablePom)),
        "no-pre-existing-paths" => Some(Arc::new(NoPreExistingPaths)),
        "artifact-refs-via" => Some(Arc::new(ArtifactRefsVia)),
        _ => None,
    }
}

/// Every built-in rule, under canonical ids.
pub fn builtin_catalog() -> Vec<Arc<dyn ValidationRule>> {
    [
        "no-snapshot-paths",
        "project-version-pattern",
        "parsable-pom",
        "no-pre-existing-paths",
        "artifact-refs-via",
    ]
    .iter()
    .filter_map(|id| build_rule(id, &BTreeMap::new()))
    .collect()
}

/// Maven repository coordinates recovered from a content path.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ArtifactRef {
    pub group_path: String,
    pub artifact_id: String,
    pub version: String,
    pub file_name: String,
}

impl ArtifactRef {
    /// Path of the artifact's POM in the same version directory.
    pub fn pom_path(&self) -> String {
        format!(
            "{}/{}/{}/{}-{}.pom",
            self.group_path, self.artifact_id, self.version, self.artifact_id, self.version
        )
    }
}

/// Parse `{group/...}/{artifactId}/{version}/{file}` coordinates. Paths too
/// shallow for the layout, or whose file name does not belong to the
/// artifact, yield `None`.
pub(crate) fn parse_artifact_path(path: &str) -> Option<ArtifactRef> {
    let mut segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 4 {
        return None;
    }
    let file_name = segments.pop()?;
    let version = segments.pop()?;
    let artifact_id = segments.pop()?;
    if !file_name.starts_with(&format!("{artifact_id}-")) {
        return None;
    }
    Some(ArtifactRef {
        group_path: segments.join("/"),
        artifact_id: artifact_id.to_string(),
        version: version.to_string(),
        file_name: file_name.to_string(),
    })
}

pub(crate) fn is_snapshot_path(path: &str) -> bool {
    path.split('/')
        .any(|seg| seg.ends_with("-SNAPSHOT") || seg.contains("-SNAPSHOT."))
}

fn summarize_paths<'a>(paths: impl IntoIterator<Item = &'a str>, total: usize) -> String {
    const SHOWN: usize = 5;
    let shown: Vec<&str> = paths.into_iter().take(SHOWN).collect();
    if total > SHOWN {
        format!("{} (+{} more)", shown.join(", "), total - SHOWN)
    } else {
        shown.join(", ")
    }
}

/// Rejects snapshot-versioned content, keeping release stores clean.
struct NoSnapshotPaths;

#[async_trait]
impl ValidationRule for NoSnapshotPaths {
    fn id(&self) -> &'static str {
        "no-snapshot-paths"
    }

    fn description(&self) -> &'static str {
        "Rejects paths with snapshot versions in the candidate set"
    }

    async fn validate(&self, request: &ValidationRequest) -> Result<Option<String>> {
        let paths = request.promotion_paths().await?;
        let offending: Vec<&str> = paths
            .iter()
            .map(String::as_str)
            .filter(|p| is_snapshot_path(p))
            .collect();
        if offending.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "{} snapshot path(s) in candidate set: {}",
            offending.len(),
            summarize_paths(offending.iter().copied(), offending.len())
        )))
    }
}

/// Requires artifact versions to match the rule-set's `versionPattern`.
struct ProjectVersionPattern {
    default_pattern: Option<String>,
}

#[async_trait]
impl ValidationRule for ProjectVersionPattern {
    fn id(&self) -> &'static str {
        "project-version-pattern"
    }

    fn description(&self) -> &'static str {
        "Requires artifact versions to match the configured versionPattern"
    }

    async fn validate(&self, request: &ValidationRequest) -> Result<Option<String>> {
        let pattern = match request
            .parameter("versionPattern")
            .map(str::to_string)
            .or_else(|| self.default_pattern.clone())
        {
            Some(p) => p,
            None => {
                tracing::warn!("project-version-pattern has no versionPattern; passing");
                return Ok(None);
            }
        };
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            AppError::Validation(format!("invalid versionPattern '{pattern}': {e}"))
        })?;

        let paths = request.promotion_paths().await?;
        let offending: Vec<&str> = paths
            .iter()
            .map(String::as_str)
            .filter(|p| {
                parse_artifact_path(p).is_some_and(|artifact| !regex.is_match(&artifact.version))
            })
            .collect();
        if offending.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "{} path(s) with versions not matching '{}': {}",
            offending.len(),
            pattern,
            summarize_paths(offending.iter().copied(), offending.len())
        )))
    }
}

/// Requires every `.pom` in the candidate set to parse as a POM document.
struct ParsablePom;

#[derive(Debug, Deserialize)]
struct PomProject {
    #[serde(rename = "artifactId")]
    artifact_id: Option<String>,
}

pub(crate) fn parse_pom(bytes: &[u8]) -> std::result::Result<(), String> {
    let text = std::str::from_utf8(bytes).map_err(|e| format!("not UTF-8: {e}"))?;
    let project: PomProject =
        quick_xml::de::from_str(text).map_err(|e| format!("not parsable XML: {e}"))?;
    if project.artifact_id.is_none() {
        return Err("missing artifactId".to_string());
    }
    Ok(())
}

#[async_trait]
impl ValidationRule for ParsablePom {
    fn id(&self) -> &'static str {
        "parsable-pom"
    }

    fn description(&self) -> &'static str {
        "Requires every candidate .pom file to parse as a POM document"
    }

    async fn validate(&self, request: &ValidationRequest) -> Result<Option<String>> {
        let paths = request.promotion_paths().await?;
        let mut offending = Vec::new();
        for path in paths.iter().filter(|p| p.ends_with(".pom")) {
            match request.retrieve_source(path).await? {
                None => offending.push(format!("{path}: unreadable")),
                Some(bytes) => {
                    if let Err(reason) = parse_pom(&bytes) {
                        offending.push(format!("{path}: {reason}"));
                    }
                }
            }
        }
        if offending.is_empty() {
            return Ok(None);
        }
        let total = offending.len();
        Ok(Some(format!(
            "{} invalid POM(s): {}",
            total,
            summarize_paths(offending.iter().map(String::as_str), total)
        )))
    }
}

/// Refuses to overwrite content that already exists in the target.
struct NoPreExistingPaths;

#[async_trait]
impl ValidationRule for NoPreExistingPaths {
    fn id(&self) -> &'static str {
        "no-pre-existing-paths"
    }

    fn description(&self) -> &'static str {
        "Rejects candidate paths that already exist in the target store"
    }

    async fn validate(&self, request: &ValidationRequest) -> Result<Option<String>> {
        let paths = request.promotion_paths().await?;
        let mut offending = Vec::new();
        for path in &paths {
            if request.target_exists(path).await? {
                offending.push(path.as_str());
            }
        }
        if offending.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "{} path(s) already present in {}: {}",
            offending.len(),
            request.target(),
            summarize_paths(offending.iter().copied(), offending.len())
        )))
    }
}

/// Requires every promoted artifact to be reachable next to its POM: the
/// POM is in the candidate set or already in the target.
struct ArtifactRefsVia;

#[async_trait]
impl ValidationRule for ArtifactRefsVia {
    fn id(&self) -> &'static str {
        "artifact-refs-via"
    }

    fn description(&self) -> &'static str {
        "Requires each artifact's POM to travel with it or already exist in the target"
    }

    async fn validate(&self, request: &ValidationRequest) -> Result<Option<String>> {
        let paths = request.promotion_paths().await?;
        let mut offending = Vec::new();
        for path in &paths {
            if path.ends_with(".pom") || is_checksum_path(path) || is_metadata_path(path) {
                continue;
            }
            let Some(artifact) = parse_artifact_path(path) else {
                continue;
            };
            let pom = artifact.pom_path();
            if !paths.contains(&pom) && !request.target_exists(&pom).await? {
                offending.push(format!("{path} (needs {pom})"));
            }
        }
        if offending.is_empty() {
            return Ok(None);
        }
        let total = offending.len();
        Ok(Some(format!(
            "{} artifact(s) without a reachable POM: {}",
            total,
            summarize_paths(offending.iter().map(String::as_str), total)
        )))
    }
}
