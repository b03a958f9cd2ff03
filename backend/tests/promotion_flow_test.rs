//! End-to-end promotion flows through the HTTP API.
//!
//! Drives the full router over filesystem storage in a temp directory:
//! store admin, content upload, dry-run, promote, validation gating, and
//! rollback.

use axum::http::StatusCode;
use axum_test::TestServer;
use bytes::Bytes;
use std::sync::Arc;
use tempfile::TempDir;

use sluice_backend::api::{build_router, AppState, SharedState};
use sluice_backend::config::{Config, MatchStrategy};
use sluice_backend::models::{
    ArtifactStore, GroupPromoteRequest, GroupPromoteResult, PackageType, PathsPromoteRequest,
    PathsPromoteResult,
};

struct Harness {
    // Keeps the data/storage trees alive for the server's lifetime.
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

async fn create_store(h: &Harness, store: &ArtifactStore) {
    let path = format!(
        "/api/admin/stores/{}/{}",
        store.key.package_type(),
        store.key.store_type()
    );
    h.server
        .post(&path)
        .json(store)
        .await
        .assert_status(StatusCode::CREATED);
}

async fn upload(h: &Harness, store: &str, path: &str, body: &'static [u8]) {
    let (package, store_type, name) = split_key(store);
    h.server
        .put(&format!("/api/content/{package}/{store_type}/{name}/{path}"))
        .bytes(Bytes::from_static(body))
        .await
        .assert_status(StatusCode::CREATED);
}

fn split_key(key: &str) -> (String, String, String) {
    let mut parts = key.splitn(3, ':');
    (
        parts.next().unwrap().to_string(),
        parts.next().unwrap().to_string(),
        parts.next().unwrap().to_string(),
    )
}

async fn standard_stores(h: &Harness) {
    create_store(
        h,
        &ArtifactStore::hosted(PackageType::Maven, "staging").with_snapshots(),
    )
    .await;
    create_store(h, &ArtifactStore::hosted(PackageType::Maven, "releases")).await;
}

fn promote_request() -> PathsPromoteRequest {
    PathsPromoteRequest::new(
        "maven:hosted:staging".parse().unwrap(),
        "maven:hosted:releases".parse().unwrap(),
    )
}

#[tokio::test]
async fn test_upload_promote_and_fetch_from_target() {
    let h = harness().await;
    standard_stores(&h).await;
    upload(&h, "maven:hosted:staging", "org/acme/app/1.0/app-1.0.jar", b"jar-bytes").await;

    let response = h
        .server
        .post("/api/promotion/paths/promote")
        .json(&promote_request())
        .await;
    response.assert_status_ok();
    let result: PathsPromoteResult = response.json();
    assert!(result.is_success());
    // Sidecars written by the upload are filtered out by default.
    assert_eq!(
        result
            .completed_paths
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>(),
        vec!["org/acme/app/1.0/app-1.0.jar"]
    );

    let fetched = h
        .server
        .get("/api/content/maven/hosted/releases/org/acme/app/1.0/app-1.0.jar")
        .await;
    fetched.assert_status_ok();
    assert_eq!(fetched.as_bytes().as_ref(), b"jar-bytes");
}

#[tokio::test]
async fn test_upload_writes_checksum_sidecars() {
    let h = harness().await;
    standard_stores(&h).await;
    upload(&h, "maven:hosted:staging", "org/x/lib.jar", b"abc").await;

    let md5 = h
        .server
        .get("/api/content/maven/hosted/staging/org/x/lib.jar.md5")
        .await;
    md5.assert_status_ok();
    assert_eq!(md5.text(), "900150983cd24fb0d6963f7d28e17f72");

    let sha1 = h
        .server
        .get("/api/content/maven/hosted/staging/org/x/lib.jar.sha1")
        .await;
    sha1.assert_status_ok();
    assert_eq!(sha1.text(), "a9993e364706816aba3e25717850c26c9cd0d89d");
}

#[tokio::test]
async fn test_dry_run_reports_pending_without_copying() {
    let h = harness().await;
    standard_stores(&h).await;
    upload(&h, "maven:hosted:staging", "org/x/a.jar", b"a").await;

    let response = h
        .server
        .post("/api/promotion/paths/promote")
        .json(&promote_request().dry_run())
        .await;
    response.assert_status_ok();
    let result: PathsPromoteResult = response.json();
    assert!(result.completed_paths.is_empty());
    assert!(result.pending_paths.contains("org/x/a.jar"));

    h.server
        .get("/api/content/maven/hosted/releases/org/x/a.jar")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_promotable_endpoint_is_stable() {
    let h = harness().await;
    standard_stores(&h).await;
    upload(&h, "maven:hosted:staging", "org/x/a.jar", b"a").await;
    upload(&h, "maven:hosted:staging", "org/x/b.jar", b"b").await;

    let url =
        "/api/promotion/paths/promotable?source=maven:hosted:staging&target=maven:hosted:releases";
    let first: PathsPromoteResult = h.server.get(url).await.json();
    let second: PathsPromoteResult = h.server.get(url).await.json();
    assert_eq!(first.pending_paths, second.pending_paths);
    assert_eq!(first.pending_paths.len(), 2);
}

#[tokio::test]
async fn test_rollback_restores_target() {
    let h = harness().await;
    standard_stores(&h).await;
    upload(&h, "maven:hosted:staging", "org/x/a.jar", b"a").await;

    let promoted: PathsPromoteResult = h
        .server
        .post("/api/promotion/paths/promote")
        .json(&promote_request())
        .await
        .json();
    assert!(promoted.is_success());

    let response = h
        .server
        .post("/api/promotion/paths/rollback")
        .json(&promoted)
        .await;
    response.assert_status_ok();
    let rollback: PathsPromoteResult = response.json();
    assert!(rollback.is_success());
    assert_eq!(rollback.completed_paths, promoted.completed_paths);

    h.server
        .get("/api/content/maven/hosted/releases/org/x/a.jar")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    // Source keeps its copy: the promotion did not purge.
    h.server
        .get("/api/content/maven/hosted/staging/org/x/a.jar")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_rule_set_blocks_snapshot_promotion() {
    let h = harness().await;
    standard_stores(&h).await;

    let sets_dir = h.state.config.rule_sets_dir();
    std::fs::create_dir_all(&sets_dir).unwrap();
    std::fs::write(
        sets_dir.join("releases-gate.toml"),
        "store_key_pattern = \"maven:hosted:releases\"\nrules = [\"no-snapshot-paths\"]\n",
    )
    .unwrap();
    h.server
        .put("/api/admin/validation/reload/rulesets")
        .await
        .assert_status_ok();

    upload(
        &h,
        "maven:hosted:staging",
        "org/x/foo/1.0-SNAPSHOT/foo-1.0-SNAPSHOT.jar",
        b"snap",
    )
    .await;

    let response = h
        .server
        .post("/api/promotion/paths/promote")
        .json(&promote_request())
        .await;
    // A rule rejection is a business result, not an HTTP failure.
    response.assert_status_ok();
    let result: PathsPromoteResult = response.json();
    assert!(!result.is_success());
    assert!(result.completed_paths.is_empty());
    let validations = result.validations.unwrap();
    assert!(validations.errors.contains_key("no-snapshot-paths"));

    h.server
        .get("/api/content/maven/hosted/releases/org/x/foo/1.0-SNAPSHOT/foo-1.0-SNAPSHOT.jar")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_promote_to_unknown_store_is_404() {
    let h = harness().await;
    standard_stores(&h).await;

    let request = PathsPromoteRequest::new(
        "maven:hosted:staging".parse().unwrap(),
        "maven:hosted:ghost".parse().unwrap(),
    );
    h.server
        .post("/api/promotion/paths/promote")
        .json(&request)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_promote_to_group_target_is_400() {
    let h = harness().await;
    standard_stores(&h).await;
    create_store(
        &h,
        &ArtifactStore::group(
            PackageType::Maven,
            "public",
            vec!["maven:hosted:releases".parse().unwrap()],
        ),
    )
    .await;

    let request = PathsPromoteRequest::new(
        "maven:hosted:staging".parse().unwrap(),
        "maven:group:public".parse().unwrap(),
    );
    h.server
        .post("/api/promotion/paths/promote")
        .json(&request)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_group_promote_and_rollback() {
    let h = harness().await;
    standard_stores(&h).await;
    create_store(
        &h,
        &ArtifactStore::group(
            PackageType::Maven,
            "public",
            vec!["maven:hosted:releases".parse().unwrap()],
        ),
    )
    .await;

    let request = GroupPromoteRequest::new(
        "maven:hosted:staging".parse().unwrap(),
        "maven:group:public".parse().unwrap(),
    );
    let response = h
        .server
        .post("/api/promotion/groups/promote")
        .json(&request)
        .await;
    response.assert_status_ok();
    let result: GroupPromoteResult = response.json();
    assert!(result.is_success());

    let group: ArtifactStore = h
        .server
        .get("/api/admin/stores/maven/group/public")
        .await
        .json();
    assert!(group
        .constituents()
        .unwrap()
        .contains(&"maven:hosted:staging".parse().unwrap()));

    h.server
        .post("/api/promotion/groups/rollback")
        .json(&request)
        .await
        .assert_status_ok();
    let group: ArtifactStore = h
        .server
        .get("/api/admin/stores/maven/group/public")
        .await
        .json();
    assert!(!group
        .constituents()
        .unwrap()
        .contains(&"maven:hosted:staging".parse().unwrap()));
}

#[tokio::test]
async fn test_group_read_serves_promoted_content() {
    let h = harness().await;
    standard_stores(&h).await;
    create_store(
        &h,
        &ArtifactStore::group(
            PackageType::Maven,
            "public",
            vec!["maven:hosted:releases".parse().unwrap()],
        ),
    )
    .await;
    upload(&h, "maven:hosted:staging", "org/x/a.jar", b"a").await;

    h.server
        .get("/api/content/maven/group/public/org/x/a.jar")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    h.server
        .post("/api/promotion/paths/promote")
        .json(&promote_request())
        .await
        .assert_status_ok();

    h.server
        .get("/api/content/maven/group/public/org/x/a.jar")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_upload_to_group_is_rejected() {
    let h = harness().await;
    standard_stores(&h).await;
    create_store(
        &h,
        &ArtifactStore::group(
            PackageType::Maven,
            "public",
            vec!["maven:hosted:releases".parse().unwrap()],
        ),
    )
    .await;

    h.server
        .put("/api/content/maven/group/public/org/x/a.jar")
        .bytes(Bytes::from_static(b"a"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_snapshot_upload_blocked_by_hosted_policy() {
    let h = harness().await;
    standard_stores(&h).await;

    // "releases" was created without snapshot uploads.
    h.server
        .put("/api/content/maven/hosted/releases/org/x/a/1.0-SNAPSHOT/a-1.0-SNAPSHOT.jar")
        .bytes(Bytes::from_static(b"snap"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // "staging" allows them.
    h.server
        .put("/api/content/maven/hosted/staging/org/x/a/1.0-SNAPSHOT/a-1.0-SNAPSHOT.jar")
        .bytes(Bytes::from_static(b"snap"))
        .await
        .assert_status(StatusCode::CREATED);
}
