//! Promotion API handlers.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::OpenApi;

use crate::api::SharedState;
use crate::error::Result;
use crate::models::{
    GroupPromoteRequest, GroupPromoteResult, PathsPromoteRequest, PathsPromoteResult, StoreKey,
    ValidationResult,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        promote_paths,
        rollback_paths,
        promotable_paths,
        promote_group,
        rollback_group
    ),
    components(schemas(
        PathsPromoteRequest,
        PathsPromoteResult,
        GroupPromoteRequest,
        GroupPromoteResult,
        ValidationResult
    ))
)]
pub struct PromotionApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/paths/promote", post(promote_paths))
        .route("/paths/rollback", post(rollback_paths))
        .route("/paths/promotable", get(promotable_paths))
        .route("/groups/promote", post(promote_group))
        .route("/groups/rollback", post(rollback_group))
}

/// POST /api/promotion/paths/promote
///
/// Rule rejections and mid-copy failures come back as a 200 result with
/// `error` populated; HTTP errors mean the machinery failed.
#[utoipa::path(
    post,
    path = "/paths/promote",
    context_path = "/api/promotion",
    tag = "promotion",
    operation_id = "promote_paths",
    request_body = PathsPromoteRequest,
    responses(
        (status = 200, description = "Promotion result", body = PathsPromoteResult),
        (status = 400, description = "Malformed request or non-hosted target"),
        (status = 404, description = "Unknown source or target store"),
    ),
)]
pub async fn promote_paths(
    State(state): State<SharedState>,
    Json(request): Json<PathsPromoteRequest>,
) -> Result<Json<PathsPromoteResult>> {
    let result = state.promotion.promote_paths(request).await?;
    Ok(Json(result))
}

/// POST /api/promotion/paths/rollback - body is a prior promotion result
#[utoipa::path(
    post,
    path = "/paths/rollback",
    context_path = "/api/promotion",
    tag = "promotion",
    operation_id = "rollback_paths",
    request_body = PathsPromoteResult,
    responses(
        (status = 200, description = "Rollback result", body = PathsPromoteResult),
        (status = 404, description = "Unknown source or target store"),
    ),
)]
pub async fn rollback_paths(
    State(state): State<SharedState>,
    Json(prior): Json<PathsPromoteResult>,
) -> Result<Json<PathsPromoteResult>> {
    let result = state.promotion.rollback_paths(prior).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct PromotableQuery {
    pub source: StoreKey,
    pub target: StoreKey,
}

/// GET /api/promotion/paths/promotable - dry-run; pending paths are the answer
#[utoipa::path(
    get,
    path = "/paths/promotable",
    context_path = "/api/promotion",
    tag = "promotion",
    operation_id = "promotable_paths",
    params(
        ("source" = String, Query, description = "Source store key"),
        ("target" = String, Query, description = "Target store key"),
    ),
    responses(
        (status = 200, description = "Dry-run promotion result", body = PathsPromoteResult),
        (status = 404, description = "Unknown source or target store"),
    ),
)]
pub async fn promotable_paths(
    State(state): State<SharedState>,
    Query(query): Query<PromotableQuery>,
) -> Result<Json<PathsPromoteResult>> {
    let result = state
        .promotion
        .promotable_paths(query.source, query.target)
        .await?;
    Ok(Json(result))
}

/// POST /api/promotion/groups/promote
#[utoipa::path(
    post,
    path = "/groups/promote",
    context_path = "/api/promotion",
    tag = "promotion",
    operation_id = "promote_group",
    request_body = GroupPromoteRequest,
    responses(
        (status = 200, description = "Group promotion result", body = GroupPromoteResult),
        (status = 400, description = "Target is not a group"),
        (status = 404, description = "Unknown source or target store"),
    ),
)]
pub async fn promote_group(
    State(state): State<SharedState>,
    Json(request): Json<GroupPromoteRequest>,
) -> Result<Json<GroupPromoteResult>> {
    let result = state.promotion.promote_group(request).await?;
    Ok(Json(result))
}

/// POST /api/promotion/groups/rollback
#[utoipa::path(
    post,
    path = "/groups/rollback",
    context_path = "/api/promotion",
    tag = "promotion",
    operation_id = "rollback_group",
    request_body = GroupPromoteRequest,
    responses(
        (status = 200, description = "Group rollback result", body = GroupPromoteResult),
        (status = 404, description = "Unknown source or target store"),
    ),
)]
pub async fn rollback_group(
    State(state): State<SharedState>,
    Json(request): Json<GroupPromoteRequest>,
) -> Result<Json<GroupPromoteResult>> {
    let result = state.promotion.rollback_group(request).await?;
    Ok(Json(result))
}
