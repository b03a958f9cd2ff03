//! Health and readiness API handlers.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::api::SharedState;
use crate::error::Result;

#[derive(OpenApi)]
#[openapi(paths(healthz, readyz), components(schemas(ReadyResponse)))]
pub struct HealthApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}

/// GET /healthz - liveness
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    operation_id = "healthz",
    responses((status = 200, description = "Process is up")),
)]
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness snapshot: what the server has loaded.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    pub status: String,
    pub stores: usize,
    pub rules: usize,
    pub rule_sets: usize,
}

/// GET /readyz - readiness, with loaded definition counts
#[utoipa::path(
    get,
    path = "/readyz",
    tag = "health",
    operation_id = "readyz",
    responses((status = 200, description = "Server is serving", body = ReadyResponse)),
)]
pub async fn readyz(State(state): State<SharedState>) -> Result<Json<ReadyResponse>> {
    Ok(Json(ReadyResponse {
        status: "ready".to_string(),
        stores: state.stores.list().await.len(),
        rules: state.rules.rule_infos().await.len(),
        rule_sets: state.rules.rule_sets().await.len(),
    }))
}
