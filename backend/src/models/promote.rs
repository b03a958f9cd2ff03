//! Promotion request and result types.
//!
//! Requests are immutable once deserialized; results accumulate the
//! completed/pending path accounting the engine produces. Nothing here is
//! persisted — results matter only for the response and for driving a later
//! rollback.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::key::StoreKey;

/// Request to promote a set of content paths from `source` into `target`.
///
/// An empty `paths` set means "everything under the source root". The
/// include flags re-admit path classes the default filters drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PathsPromoteRequest {
    #[schema(value_type = String, example = "maven:hosted:staging")]
    pub source: StoreKey,
    #[schema(value_type = String, example = "maven:hosted:releases")]
    pub target: StoreKey,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub paths: BTreeSet<String>,
    /// Delete the copied paths from the source after a fully successful copy.
    #[serde(default)]
    pub purge_source: bool,
    /// Resolve and validate only; copy nothing.
    #[serde(default)]
    pub dry_run: bool,
    /// Keep `maven-metadata.xml` (and its checksums) in the candidate set.
    #[serde(default)]
    pub include_metadata: bool,
    /// Keep checksum files (`.md5`, `.sha1`, ...) in the candidate set.
    #[serde(default)]
    pub include_checksums: bool,
}

impl PathsPromoteRequest {
    pub fn new(source: StoreKey, target: StoreKey) -> Self {
        Self {
            source,
            target,
            paths: BTreeSet::new(),
            purge_source: false,
            dry_run: false,
            include_metadata: false,
            include_checksums: false,
        }
    }

    /// Restrict the request to explicit paths.
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn purging_source(mut self) -> Self {
        self.purge_source = true;
        self
    }
}

/// Request to add `source` as a constituent of the `target` group.
///
/// A membership mutation only — no content moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupPromoteRequest {
    #[schema(value_type = String, example = "maven:hosted:releases")]
    pub source: StoreKey,
    #[schema(value_type = String, example = "maven:group:public")]
    pub target: StoreKey,
    #[serde(default)]
    pub dry_run: bool,
}

impl GroupPromoteRequest {
    pub fn new(source: StoreKey, target: StoreKey) -> Self {
        Self {
            source,
            target,
            dry_run: false,
        }
    }
}

/// Per-rule validation failures for one promotion attempt.
///
/// Empty means the promotion may proceed. Keys are rule names from the
/// matched rule-set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidationResult {
    /// Name of the rule-set that matched the target, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<String>,
    /// Rule name → error message, for every rule that rejected the request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn for_rule_set(name: impl Into<String>) -> Self {
        Self {
            rule_set: Some(name.into()),
            errors: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, rule: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(rule.into(), message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// One-line summary suitable for a result's `error` field.
    pub fn summary(&self) -> String {
        let failed: Vec<&str> = self.errors.keys().map(String::as_str).collect();
        format!(
            "validation failed for {} rule(s): {}",
            self.errors.len(),
            failed.join(", ")
        )
    }
}

/// Outcome of a paths promotion.
///
/// `completed_paths` and `pending_paths` are always disjoint. When `error`
/// is set, `completed_paths` lists exactly the paths whose copies fully
/// succeeded before the failure, which is what rollback operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PathsPromoteResult {
    pub request: PathsPromoteRequest,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub completed_paths: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub pending_paths: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<ValidationResult>,
}

impl PathsPromoteResult {
    /// All paths copied; nothing outstanding.
    pub fn completed(request: PathsPromoteRequest, completed_paths: BTreeSet<String>) -> Self {
        Self {
            request,
            completed_paths,
            pending_paths: BTreeSet::new(),
            error: None,
            validations: None,
        }
    }

    /// Dry-run outcome: candidates reported as pending, nothing copied.
    pub fn dry_run(request: PathsPromoteRequest, pending_paths: BTreeSet<String>) -> Self {
        Self {
            request,
            completed_paths: BTreeSet::new(),
            pending_paths,
            error: None,
            validations: None,
        }
    }

    /// Rule rejection: nothing copied, errors summarized from `validations`.
    pub fn rejected(request: PathsPromoteRequest, validations: ValidationResult) -> Self {
        let error = Some(validations.summary());
        Self {
            request,
            completed_paths: BTreeSet::new(),
            pending_paths: BTreeSet::new(),
            error,
            validations: Some(validations),
        }
    }

    /// Mid-copy failure: `completed` holds what fully copied, `pending` what
    /// was never attempted.
    pub fn failed(
        request: PathsPromoteRequest,
        completed: BTreeSet<String>,
        pending: BTreeSet<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut result = Self {
            request,
            completed_paths: completed,
            pending_paths: pending,
            error: Some(error.into()),
            validations: None,
        };
        // A path that finished copying is not pending, whatever the caller
        // handed us.
        result.pending_paths = &result.pending_paths - &result.completed_paths;
        result
    }

    pub fn with_validations(mut self, validations: ValidationResult) -> Self {
        self.validations = Some(validations);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a group promotion or rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupPromoteResult {
    pub request: GroupPromoteRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<ValidationResult>,
}

impl GroupPromoteResult {
    pub fn completed(request: GroupPromoteRequest) -> Self {
        Self {
            request,
            error: None,
            validations: None,
        }
    }

    pub fn rejected(request: GroupPromoteRequest, validations: ValidationResult) -> Self {
        Self {
            request,
            error: Some(validations.summary()),
            validations: Some(validations),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
