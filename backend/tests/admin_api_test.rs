//! Store and validation administration through the HTTP API.

use axum::http::StatusCode;
use axum_test::TestServer;
use std::sync::Arc;
use tempfile::TempDir;

use sluice_backend::api::{build_router, AppState, SharedState};
use sluice_backend::config::{Config, MatchStrategy};
use sluice_backend::models::{ArtifactStore, PackageType};
use sluice_backend::services::rule_registry::RuleInfo;

struct Harness {
    _dir: TempDir,
    server: TestServer,
    state: SharedState,
}

async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let config = Config {
        bind_addr: "127.0.0.1:0".to_string(),
        data_dir: dir.path().join("data"),
        storage_dir: dir.path().join("storage"),
        promote_workers: 4,
        promote_timeout_secs: 30,
        ruleset_match: MatchStrategy::MostSpecific,
    };
    let state = Arc::new(AppState::from_config(config).await.unwrap());
    let server = TestServer::new(build_router(state.clone())).unwrap();
    Harness {
        _dir: dir,
        server,
        state,
    }
}

// ---------------------------------------------------------------------------
// Store definitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_store_crud_cycle() {
    let h = harness().await;
    let store = ArtifactStore::hosted(PackageType::Maven, "releases")
        .with_description("promoted releases");

    let created = h
        .server
        .post("/api/admin/stores/maven/hosted")
        .json(&store)
        .await;
    created.assert_status(StatusCode::CREATED);

    let fetched: ArtifactStore = h
        .server
        .get("/api/admin/stores/maven/hosted/releases")
        .await
        .json();
    assert_eq!(fetched, store);

    let listed: Vec<ArtifactStore> = h.server.get("/api/admin/stores/maven/hosted").await.json();
    assert_eq!(listed, vec![store.clone()]);

    let updated = store.clone().with_description("now frozen");
    h.server
        .put("/api/admin/stores/maven/hosted/releases")
        .json(&updated)
        .await
        .assert_status_ok();
    let fetched: ArtifactStore = h
        .server
        .get("/api/admin/stores/maven/hosted/releases")
        .await
        .json();
    assert_eq!(fetched.description.as_deref(), Some("now frozen"));

    h.server
        .delete("/api/admin/stores/maven/hosted/releases")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    h.server
        .get("/api/admin/stores/maven/hosted/releases")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_store_conflicts() {
    let h = harness().await;
    let store = ArtifactStore::hosted(PackageType::Npm, "shared");

    h.server
        .post("/api/admin/stores/npm/hosted")
        .json(&store)
        .await
        .assert_status(StatusCode::CREATED);
    h.server
        .post("/api/admin/stores/npm/hosted")
        .json(&store)
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_store_key_must_match_path() {
    let h = harness().await;
    let store = ArtifactStore::hosted(PackageType::Maven, "releases");

    // Posted under npm, but the body key says maven.
    h.server
        .post("/api/admin/stores/npm/hosted")
        .json(&store)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_package_type_is_400() {
    let h = harness().await;
    h.server
        .get("/api/admin/stores/cargo/hosted")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Validation administration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_builtin_rule_catalog_is_listed() {
    let h = harness().await;

    let rules: Vec<RuleInfo> = h
        .server
        .get("/api/admin/validation/rules/all")
        .await
        .json();
    let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "no-snapshot-paths",
            "project-version-pattern",
            "parsable-pom",
            "no-pre-existing-paths",
            "artifact-refs-via",
        ]
    );

    let rule: RuleInfo = h
        .server
        .get("/api/admin/validation/rules/named/no-snapshot-paths")
        .await
        .json();
    assert_eq!(rule.rule_id, "no-snapshot-paths");

    h.server
        .get("/api/admin/validation/rules/named/ghost")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rule_set_reload_and_lookup() {
    let h = harness().await;

    h.server
        .get("/api/admin/validation/rulesets/storekey/maven:hosted:releases")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let sets_dir = h.state.config.rule_sets_dir();
    std::fs::create_dir_all(&sets_dir).unwrap();
    std::fs::write(
        sets_dir.join("maven-releases.toml"),
        concat!(
            "store_key_pattern = \"maven:hosted:releases\"\n",
            "rules = [\"no-snapshot-paths\", \"parsable-pom\"]\n",
        ),
    )
    .unwrap();

    let reloaded = h.server.put("/api/admin/validation/reload/rulesets").await;
    reloaded.assert_status_ok();
    assert_eq!(reloaded.text(), "true");

    let matched = h
        .server
        .get("/api/admin/validation/rulesets/storekey/maven:hosted:releases")
        .await;
    matched.assert_status_ok();
    let body = matched.text();
    assert!(body.contains("maven-releases"));
    assert!(body.contains("no-snapshot-paths"));

    h.server
        .get("/api/admin/validation/rulesets/named/maven-releases")
        .await
        .assert_status_ok();
    h.server
        .get("/api/admin/validation/rulesets/storekey/npm:hosted:shared")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reload_all_and_bad_target() {
    let h = harness().await;

    h.server
        .put("/api/admin/validation/reload/all")
        .await
        .assert_status_ok();
    h.server
        .put("/api/admin/validation/reload/everything")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_store_key_in_lookup_is_400() {
    let h = harness().await;
    h.server
        .get("/api/admin/validation/rulesets/storekey/not-a-key")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_and_readiness() {
    let h = harness().await;

    h.server.get("/healthz").await.assert_status_ok();

    let ready = h.server.get("/readyz").await;
    ready.assert_status_ok();
    let body = ready.text();
    assert!(body.contains("ready"));
    // Builtin rule catalog is loaded with no definition files present.
    assert!(body.contains("\"rules\":5"));
}
