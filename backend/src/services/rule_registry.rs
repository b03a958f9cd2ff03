//! Registry of promotion validation rules and rule-sets.
//!
//! Definitions are TOML files on disk. Reload builds a fresh snapshot off
//! the write lock and swaps it in whole, so in-flight validations keep the
//! catalog they started with. With no rule files present the built-in
//! catalog is registered under its canonical ids; one definition file takes
//! over the whole namespace.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::config::MatchStrategy;
use crate::error::Result;
use crate::models::StoreKey;
use crate::services::rules::{self, ValidationRule};

/// Catalog entry for admin listings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RuleInfo {
    /// Registered name, referenced from rule-sets.
    pub name: String,
    /// Built-in implementation backing this name.
    pub rule_id: String,
    pub description: String,
}

/// A named rule-set: which rules gate promotions into which target stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ValidationRuleSet {
    pub name: String,
    /// Full-match pattern against the target's `package:type:name` key.
    pub store_key_pattern: String,
    /// Rule names to run, in this order.
    pub rule_names: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

/// On-disk rule definition. The file stem is the default name.
#[derive(Debug, Deserialize)]
struct RuleDoc {
    name: Option<String>,
    /// Built-in implementation id, e.g. `no-snapshot-paths`.
    rule: String,
    #[serde(default)]
    parameters: BTreeMap<String, String>,
}

/// On-disk rule-set definition. The file stem is the default name.
#[derive(Debug, Deserialize)]
struct RuleSetDoc {
    name: Option<String>,
    store_key_pattern: String,
    #[serde(default)]
    rules: Vec<String>,
    #[serde(default)]
    parameters: BTreeMap<String, String>,
}

#[derive(Clone)]
struct NamedRule {
    info: RuleInfo,
    rule: Arc<dyn ValidationRule>,
}

#[derive(Clone)]
struct CompiledRuleSet {
    regex: Regex,
    rule_set: Arc<ValidationRuleSet>,
}

/// Rules and rule-sets loaded together; replaced atomically on reload.
struct Snapshot {
    rules: Vec<NamedRule>,
    rule_sets: Vec<CompiledRuleSet>,
}

/// Validation rule catalog and rule-set matcher.
pub struct RuleRegistry {
    rules_dir: PathBuf,
    rule_sets_dir: PathBuf,
    strategy: MatchStrategy,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl RuleRegistry {
    /// Load all definitions from the two directories. Missing directories
    /// mean "no definitions", not an error.
    pub async fn open(
        rules_dir: impl Into<PathBuf>,
        rule_sets_dir: impl Into<PathBuf>,
        strategy: MatchStrategy,
    ) -> Result<Self> {
        let rules_dir = rules_dir.into();
        let rule_sets_dir = rule_sets_dir.into();
        let rules = Self::load_rules(&rules_dir).await?;
        let rule_sets = Self::load_rule_sets(&rule_sets_dir).await?;
        tracing::info!(
            rules = rules.len(),
            rule_sets = rule_sets.len(),
            strategy = ?strategy,
            "loaded promotion validation definitions"
        );
        Ok(Self {
            rules_dir,
            rule_sets_dir,
            strategy,
            snapshot: RwLock::new(Arc::new(Snapshot { rules, rule_sets })),
        })
    }

    async fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    /// Look up a rule by its registered name.
    pub async fn rule_named(&self, name: &str) -> Option<Arc<dyn ValidationRule>> {
        self.snapshot()
            .await
            .rules
            .iter()
            .find(|r| r.info.name == name)
            .map(|r| r.rule.clone())
    }

    /// The registered rule catalog, in load order.
    pub async fn rule_infos(&self) -> Vec<RuleInfo> {
        self.snapshot()
            .await
            .rules
            .iter()
            .map(|r| r.info.clone())
            .collect()
    }

    /// All loaded rule-sets, in load order.
    pub async fn rule_sets(&self) -> Vec<Arc<ValidationRuleSet>> {
        self.snapshot()
            .await
            .rule_sets
            .iter()
            .map(|c| c.rule_set.clone())
            .collect()
    }

    pub async fn rule_set_named(&self, name: &str) -> Option<Arc<ValidationRuleSet>> {
        self.snapshot()
            .await
            .rule_sets
            .iter()
            .find(|c| c.rule_set.name == name)
            .map(|c| c.rule_set.clone())
    }

    /// Pick the rule-set whose pattern matches the whole target key, per
    /// the configured strategy. `None` means the target is unguarded.
    pub async fn rule_set_matching(&self, target: &StoreKey) -> Option<Arc<ValidationRuleSet>> {
        let snapshot = self.snapshot().await;
        let key = target.to_string();
        let mut best: Option<(usize, &CompiledRuleSet)> = None;
        for compiled in &snapshot.rule_sets {
            if !compiled.regex.is_match(&key) {
                continue;
            }
            match self.strategy {
                MatchStrategy::Ordered => return Some(compiled.rule_set.clone()),
                MatchStrategy::MostSpecific => {
                    let score = literal_length(&compiled.rule_set.store_key_pattern);
                    // Strict > keeps the earliest definition on ties.
                    if best.is_none_or(|(top, _)| score > top) {
                        best = Some((score, compiled));
                    }
                }
            }
        }
        best.map(|(_, compiled)| compiled.rule_set.clone())
    }

    /// Re-read the rule catalog from disk; rule-sets are left untouched.
    pub async fn reload_rules(&self) -> Result<usize> {
        let rules = Self::load_rules(&self.rules_dir).await?;
        let count = rules.len();
        let mut guard = self.snapshot.write().await;
        *guard = Arc::new(Snapshot {
            rules,
            rule_sets: guard.rule_sets.clone(),
        });
        Ok(count)
    }

    /// Re-read rule-sets from disk; the rule catalog is left untouched.
    pub async fn reload_rule_sets(&self) -> Result<usize> {
        let rule_sets = Self::load_rule_sets(&self.rule_sets_dir).await?;
        let count = rule_sets.len();
        let mut guard = self.snapshot.write().await;
        *guard = Arc::new(Snapshot {
            rules: guard.rules.clone(),
            rule_sets,
        });
        Ok(count)
    }

    /// Re-read everything. Returns (rules, rule-sets) counts.
    pub async fn reload_all(&self) -> Result<(usize, usize)> {
        let rules = Self::load_rules(&self.rules_dir).await?;
        let rule_sets = Self::load_rule_sets(&self.rule_sets_dir).await?;
        let counts = (rules.len(), rule_sets.len());
        let mut guard = self.snapshot.write().await;
        *guard = Arc::new(Snapshot { rules, rule_sets });
        Ok(counts)
    }

    async fn load_rules(dir: &Path) -> Result<Vec<NamedRule>> {
        let docs: Vec<(String, RuleDoc)> = read_toml_docs(dir).await?;
        if docs.is_empty() {
            return Ok(rules::builtin_catalog()
                .into_iter()
                .map(|rule| NamedRule {
                    info: RuleInfo {
                        name: rule.id().to_string(),
                        rule_id: rule.id().to_string(),
                        description: rule.description().to_string(),
                    },
                    rule,
                })
                .collect());
        }

        let mut loaded: Vec<NamedRule> = Vec::with_capacity(docs.len());
        for (stem, doc) in docs {
            let name = doc.name.unwrap_or(stem);
            if loaded.iter().any(|r| r.info.name == name) {
                tracing::warn!(rule = %name, "skipping duplicate rule definition");
                continue;
            }
            let Some(rule) = rules::build_rule(&doc.rule, &doc.parameters) else {
                tracing::warn!(
                    rule = %name,
                    implementation = %doc.rule,
                    "skipping rule definition with unknown implementation"
                );
                continue;
            };
            loaded.push(NamedRule {
                info: RuleInfo {
                    name,
                    rule_id: doc.rule,
                    description: rule.description().to_string(),
                },
                rule,
            });
        }
        Ok(loaded)
    }

    async fn load_rule_sets(dir: &Path) -> Result<Vec<CompiledRuleSet>> {
        let docs: Vec<(String, RuleSetDoc)> = read_toml_docs(dir).await?;
        let mut loaded: Vec<CompiledRuleSet> = Vec::with_capacity(docs.len());
        for (stem, doc) in docs {
            let name = doc.name.unwrap_or(stem);
            if loaded.iter().any(|c| c.rule_set.name == name) {
                tracing::warn!(rule_set = %name, "skipping duplicate rule-set definition");
                continue;
            }
            let regex = match Regex::new(&format!("^(?:{})$", doc.store_key_pattern)) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(
                        rule_set = %name,
                        pattern = %doc.store_key_pattern,
                        error = %e,
                        "skipping rule-set with invalid store key pattern"
                    );
                    continue;
                }
            };
            loaded.push(CompiledRuleSet {
                regex,
                rule_set: Arc::new(ValidationRuleSet {
                    name,
                    store_key_pattern: doc.store_key_pattern,
                    rule_names: doc.rules,
                    parameters: doc.parameters,
                }),
            });
        }
        Ok(loaded)
    }
}

/// Count of pattern characters that match literally. A longer literal core
/// means a more specific pattern.
fn literal_length(pattern: &str) -> usize {
    pattern
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '.' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$' | '\\'
            )
        })
        .count()
}

/// Parse every `*.toml` in `dir`, ordered by file name. Unparsable files
/// are skipped with a warning; a missing directory yields no documents.
async fn read_toml_docs<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<(String, T)>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("toml") {
            files.push(path);
        }
    }
    files.sort();

    let mut docs = Vec::with_capacity(files.len());
    for path in files {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let text = tokio::fs::read_to_string(&path).await?;
        match toml::from_str::<T>(&text) {
            Ok(doc) => docs.push((stem, doc)),
            Err(e) => {
                tracing::warn!(
                    file = %path.display(),
                    error = %e,
                    "skipping unparsable definition file"
                );
            }
        }
    }
    Ok(docs)
}
