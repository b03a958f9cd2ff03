//! Validation context and the rule-running engine.
//!
//! One [`ValidationRequest`] is shared by every rule of an attempt; the
//! source path set behind it is computed at most once per attempt, however
//! many rules ask for it.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::OnceCell;

use crate::error::{AppError, PromotionError, Result};
use crate::models::{PathsPromoteRequest, StoreKey, ValidationResult};
use crate::services::content_gateway::ContentGateway;
use crate::services::path_resolver;
use crate::services::rule_registry::{RuleRegistry, ValidationRuleSet};
use crate::storage::normalize_path;

/// Request-scoped context handed to validation rules.
pub struct ValidationRequest {
    request: PathsPromoteRequest,
    rule_set: Option<Arc<ValidationRuleSet>>,
    gateway: Arc<ContentGateway>,
    source_paths: OnceCell<BTreeSet<String>>,
}

impl ValidationRequest {
    pub fn new(
        request: PathsPromoteRequest,
        rule_set: Option<Arc<ValidationRuleSet>>,
        gateway: Arc<ContentGateway>,
    ) -> Self {
        Self {
            request,
            rule_set,
            gateway,
            source_paths: OnceCell::new(),
        }
    }

    pub fn promote_request(&self) -> &PathsPromoteRequest {
        &self.request
    }

    pub fn source(&self) -> &StoreKey {
        &self.request.source
    }

    pub fn target(&self) -> &StoreKey {
        &self.request.target
    }

    pub fn rule_set(&self) -> Option<&Arc<ValidationRuleSet>> {
        self.rule_set.as_ref()
    }

    /// Parameter from the matched rule-set, e.g. `versionPattern`.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.rule_set
            .as_ref()
            .and_then(|rs| rs.parameters.get(name))
            .map(String::as_str)
    }

    /// The unfiltered candidate basis, computed once: explicit request paths
    /// (normalized) or the walked source tree.
    pub async fn source_paths(&self) -> Result<&BTreeSet<String>> {
        self.source_paths
            .get_or_try_init(|| async {
                if self.request.paths.is_empty() {
                    path_resolver::source_paths(&self.gateway, &self.request.source).await
                } else {
                    self.request.paths.iter().map(|p| normalize_path(p)).collect()
                }
            })
            .await
    }

    /// The candidate set rules (and the copy phase) operate on: explicit
    /// paths verbatim, walked trees minus the default exclusions.
    pub async fn promotion_paths(&self) -> Result<BTreeSet<String>> {
        let all = self.source_paths().await?;
        if !self.request.paths.is_empty() {
            return Ok(all.clone());
        }
        Ok(path_resolver::filter_paths(
            all,
            self.request.include_metadata,
            self.request.include_checksums,
        ))
    }

    /// Read a file through the source store.
    pub async fn retrieve_source(&self, path: &str) -> Result<Option<Bytes>> {
        self.gateway.retrieve(&self.request.source, path).await
    }

    /// Whether the target already holds `path`.
    pub async fn target_exists(&self, path: &str) -> Result<bool> {
        self.gateway.exists(&self.request.target, path).await
    }
}

/// Runs the matched rule-set against a shared request context.
pub struct ValidationEngine {
    registry: Arc<RuleRegistry>,
}

impl ValidationEngine {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self { registry }
    }

    /// Build the context for a promotion attempt, matching the rule-set for
    /// its target store.
    pub async fn request_context(
        &self,
        request: PathsPromoteRequest,
        gateway: Arc<ContentGateway>,
    ) -> ValidationRequest {
        let rule_set = self.registry.rule_set_matching(&request.target).await;
        ValidationRequest::new(request, rule_set, gateway)
    }

    /// Run every named rule of the matched set, in declared order.
    ///
    /// No matched rule-set means validation passes trivially. Unknown rule
    /// names are skipped with a warning. A rule returning an error message
    /// is recorded and evaluation continues; a rule that fails to execute
    /// aborts the attempt.
    pub async fn validate(&self, context: &ValidationRequest) -> Result<ValidationResult> {
        let Some(rule_set) = context.rule_set().cloned() else {
            return Ok(ValidationResult::default());
        };

        let mut result = ValidationResult::for_rule_set(&rule_set.name);
        for name in &rule_set.rule_names {
            let Some(rule) = self.registry.rule_named(name).await else {
                tracing::warn!(
                    rule = %name,
                    rule_set = %rule_set.name,
                    "skipping unknown validation rule"
                );
                continue;
            };
            match rule.validate(context).await {
                Ok(None) => {}
                Ok(Some(message)) => {
                    tracing::info!(rule = %name, %message, "validation rule rejected promotion");
                    result.record(name.clone(), message);
                }
                Err(e) => {
                    return Err(AppError::Promotion(PromotionError::rule_execution(
                        name,
                        e.to_string(),
                    )));
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtifactStore, PackageType};
    use crate::services::event_bus::EventBus;
    use crate::services::store_service::StoreService;
    use crate::storage::{ContentStorage, MemoryStorage};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn key(s: &str) -> StoreKey {
        s.parse().expect("test key should parse")
    }

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    async fn fixture() -> (TempDir, Arc<MemoryStorage>, Arc<ContentGateway>) {
        let dir = TempDir::new().unwrap();
        let stores =
            Arc::new(StoreService::open(dir.path(), Arc::new(EventBus::new(16))).unwrap());
        for store in [
            ArtifactStore::hosted(PackageType::Maven, "staging").with_snapshots(),
            ArtifactStore::hosted(PackageType::Maven, "releases"),
        ] {
            stores.create(store).await.unwrap();
        }
        let storage = Arc::new(MemoryStorage::new());
        let gateway = Arc::new(ContentGateway::new(stores, storage.clone()));
        (dir, storage, gateway)
    }

    #[tokio::test]
    async fn test_source_paths_computed_once() {
        let (_dir, storage, gateway) = fixture().await;
        let staging = key("maven:hosted:staging");
        storage
            .put(&staging, "org/x/a.jar", Bytes::from_static(b"a"))
            .await
            .unwrap();

        let context = ValidationRequest::new(
            PathsPromoteRequest::new(staging.clone(), key("maven:hosted:releases")),
            None,
            gateway,
        );
        assert_eq!(context.source_paths().await.unwrap(), &set(&["org/x/a.jar"]));

        // Mutating storage after the first access must not change the view.
        storage
            .put(&staging, "org/x/late.jar", Bytes::from_static(b"l"))
            .await
            .unwrap();
        assert_eq!(context.source_paths().await.unwrap(), &set(&["org/x/a.jar"]));
    }

    #[tokio::test]
    async fn test_promotion_paths_refilter_the_memoized_set() {
        let (_dir, storage, gateway) = fixture().await;
        let staging = key("maven:hosted:staging");
        for path in ["org/x/lib.jar", "org/x/lib.jar.md5", "maven-metadata.xml"] {
            storage
                .put(&staging, path, Bytes::from_static(b"x"))
                .await
                .unwrap();
        }

        let mut request = PathsPromoteRequest::new(staging, key("maven:hosted:releases"));
        request.include_checksums = true;
        let context = ValidationRequest::new(request, None, gateway);

        assert_eq!(
            context.source_paths().await.unwrap(),
            &set(&["maven-metadata.xml", "org/x/lib.jar", "org/x/lib.jar.md5"])
        );
        assert_eq!(
            context.promotion_paths().await.unwrap(),
            set(&["org/x/lib.jar", "org/x/lib.jar.md5"])
        );
    }

    #[tokio::test]
    async fn test_explicit_paths_bypass_filters() {
        let (_dir, _storage, gateway) = fixture().await;
        let request = PathsPromoteRequest::new(
            key("maven:hosted:staging"),
            key("maven:hosted:releases"),
        )
        .with_paths(["/org/x/lib.jar.md5", "maven-metadata.xml"]);

        let context = ValidationRequest::new(request, None, gateway);
        assert_eq!(
            context.promotion_paths().await.unwrap(),
            set(&["maven-metadata.xml", "org/x/lib.jar.md5"])
        );
    }

    #[tokio::test]
    async fn test_rule_set_parameter_lookup() {
        let (_dir, _storage, gateway) = fixture().await;
        let rule_set = Arc::new(ValidationRuleSet {
            name: "maven-releases".to_string(),
            store_key_pattern: "maven:hosted:releases".to_string(),
            rule_names: vec!["project-version-pattern".to_string()],
            parameters: BTreeMap::from([(
                "versionPattern".to_string(),
                r"\d+(\.\d+)*".to_string(),
            )]),
        });

        let context = ValidationRequest::new(
            PathsPromoteRequest::new(key("maven:hosted:staging"), key("maven:hosted:releases")),
            Some(rule_set),
            gateway,
        );
        assert_eq!(context.parameter("versionPattern"), Some(r"\d+(\.\d+)*"));
        assert_eq!(context.parameter("unknown"), None);
    }

    // -----------------------------------------------------------------------
    // Engine behavior
    // -----------------------------------------------------------------------

    async fn engine_from(dir: &TempDir, rule_files: &[(&str, &str)], rule_set: &str) -> ValidationEngine {
        let rules_dir = dir.path().join("rules");
        let sets_dir = dir.path().join("rule-sets");
        std::fs::create_dir_all(&rules_dir).unwrap();
        std::fs::create_dir_all(&sets_dir).unwrap();
        for (file, body) in rule_files {
            std::fs::write(rules_dir.join(file), body).unwrap();
        }
        std::fs::write(sets_dir.join("gate.toml"), rule_set).unwrap();
        let registry = RuleRegistry::open(
            rules_dir,
            sets_dir,
            crate::config::MatchStrategy::MostSpecific,
        )
        .await
        .unwrap();
        ValidationEngine::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_unguarded_target_passes_trivially() {
        let (_dir, _storage, gateway) = fixture().await;
        let defs = TempDir::new().unwrap();
        let engine = engine_from(
            &defs,
            &[],
            "store_key_pattern = \"npm:hosted:.*\"\nrules = [\"no-snapshot-paths\"]\n",
        )
        .await;

        let context = engine
            .request_context(
                PathsPromoteRequest::new(key("maven:hosted:staging"), key("maven:hosted:releases")),
                gateway,
            )
            .await;
        assert!(context.rule_set().is_none());

        let result = engine.validate(&context).await.unwrap();
        assert!(result.is_valid());
        assert_eq!(result.rule_set, None);
    }

    #[tokio::test]
    async fn test_rejections_are_recorded_and_unknown_rules_skipped() {
        let (_dir, storage, gateway) = fixture().await;
        let staging = key("maven:hosted:staging");
        let releases = key("maven:hosted:releases");
        let snapshot_jar = "org/x/app/1.0-SNAPSHOT/app-1.0-SNAPSHOT.jar";
        storage
            .put(&staging, snapshot_jar, Bytes::from_static(b"j"))
            .await
            .unwrap();
        // Same path already in the target, to trip no-pre-existing-paths.
        storage
            .put(&releases, snapshot_jar, Bytes::from_static(b"j"))
            .await
            .unwrap();

        let defs = TempDir::new().unwrap();
        let engine = engine_from(
            &defs,
            &[],
            concat!(
                "store_key_pattern = \"maven:hosted:releases\"\n",
                "rules = [\"ghost-rule\", \"no-snapshot-paths\", \"no-pre-existing-paths\"]\n",
            ),
        )
        .await;

        let context = engine
            .request_context(PathsPromoteRequest::new(staging, releases), gateway)
            .await;
        let result = engine.validate(&context).await.unwrap();

        assert_eq!(result.rule_set.as_deref(), Some("gate"));
        assert!(!result.is_valid());
        let failed: Vec<&str> = result.errors.keys().map(String::as_str).collect();
        assert_eq!(failed, vec!["no-pre-existing-paths", "no-snapshot-paths"]);
    }

    #[tokio::test]
    async fn test_rule_execution_failure_aborts_the_attempt() {
        let (_dir, _storage, gateway) = fixture().await;
        let defs = TempDir::new().unwrap();
        let engine = engine_from(
            &defs,
            &[(
                "bad.toml",
                concat!(
                    "rule = \"project-version-pattern\"\n",
                    "\n",
                    "[parameters]\n",
                    "versionPattern = \"([\"\n",
                ),
            )],
            "store_key_pattern = \"maven:hosted:releases\"\nrules = [\"bad\"]\n",
        )
        .await;

        let context = engine
            .request_context(
                PathsPromoteRequest::new(key("maven:hosted:staging"), key("maven:hosted:releases")),
                gateway,
            )
            .await;
        match engine.validate(&context).await {
            Err(AppError::Promotion(PromotionError::RuleExecution { rule, .. })) => {
                assert_eq!(rule, "bad");
            }
            other => panic!("expected rule execution failure, got {other:?}"),
        }
    }
}
