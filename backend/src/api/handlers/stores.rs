//! Store definition API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use utoipa::OpenApi;

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::{ArtifactStore, PackageType, StoreKey, StoreSpec, StoreType};

#[derive(OpenApi)]
#[openapi(
    paths(list_stores, create_store, get_store, update_store, delete_store),
    components(schemas(ArtifactStore, StoreSpec))
)]
pub struct StoresApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/:package/:store_type", get(list_stores).post(create_store))
        .route(
            "/:package/:store_type/:name",
            get(get_store).put(update_store).delete(delete_store),
        )
}

fn parse_types(package: &str, store_type: &str) -> Result<(PackageType, StoreType)> {
    Ok((package.parse()?, store_type.parse()?))
}

/// GET /api/admin/stores/:package/:store_type
#[utoipa::path(
    get,
    path = "/{package}/{store_type}",
    context_path = "/api/admin/stores",
    tag = "stores",
    operation_id = "list_stores",
    params(
        ("package" = String, Path, description = "Package type: maven, npm, or generic"),
        ("store_type" = String, Path, description = "Store type: remote, hosted, or group"),
    ),
    responses(
        (status = 200, description = "Store definitions", body = [ArtifactStore]),
        (status = 400, description = "Unknown package or store type"),
    ),
)]
pub async fn list_stores(
    State(state): State<SharedState>,
    Path((package, store_type)): Path<(String, String)>,
) -> Result<Json<Vec<ArtifactStore>>> {
    let (package, store_type) = parse_types(&package, &store_type)?;
    let mut stores = state.stores.list_by_package(package).await;
    stores.retain(|s| s.key.store_type() == store_type);
    Ok(Json(stores))
}

/// POST /api/admin/stores/:package/:store_type
#[utoipa::path(
    post,
    path = "/{package}/{store_type}",
    context_path = "/api/admin/stores",
    tag = "stores",
    operation_id = "create_store",
    request_body = ArtifactStore,
    params(
        ("package" = String, Path, description = "Package type"),
        ("store_type" = String, Path, description = "Store type"),
    ),
    responses(
        (status = 201, description = "Store created", body = ArtifactStore),
        (status = 400, description = "Key does not match the path, or invalid definition"),
        (status = 409, description = "Store already exists"),
    ),
)]
pub async fn create_store(
    State(state): State<SharedState>,
    Path((package, store_type)): Path<(String, String)>,
    Json(store): Json<ArtifactStore>,
) -> Result<(StatusCode, Json<ArtifactStore>)> {
    let (package, store_type) = parse_types(&package, &store_type)?;
    if store.key.package_type() != package || store.key.store_type() != store_type {
        return Err(AppError::Validation(format!(
            "store key {} does not belong under {package}/{store_type}",
            store.key
        )));
    }
    let created = state.stores.create(store).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/admin/stores/:package/:store_type/:name
#[utoipa::path(
    get,
    path = "/{package}/{store_type}/{name}",
    context_path = "/api/admin/stores",
    tag = "stores",
    operation_id = "get_store",
    params(
        ("package" = String, Path, description = "Package type"),
        ("store_type" = String, Path, description = "Store type"),
        ("name" = String, Path, description = "Store name"),
    ),
    responses(
        (status = 200, description = "Store definition", body = ArtifactStore),
        (status = 404, description = "No such store"),
    ),
)]
pub async fn get_store(
    State(state): State<SharedState>,
    Path((package, store_type, name)): Path<(String, String, String)>,
) -> Result<Json<ArtifactStore>> {
    let (package, store_type) = parse_types(&package, &store_type)?;
    let key = StoreKey::new(package, store_type, name)?;
    Ok(Json(state.stores.get(&key).await?))
}

/// PUT /api/admin/stores/:package/:store_type/:name
#[utoipa::path(
    put,
    path = "/{package}/{store_type}/{name}",
    context_path = "/api/admin/stores",
    tag = "stores",
    operation_id = "update_store",
    request_body = ArtifactStore,
    params(
        ("package" = String, Path, description = "Package type"),
        ("store_type" = String, Path, description = "Store type"),
        ("name" = String, Path, description = "Store name"),
    ),
    responses(
        (status = 200, description = "Store updated", body = ArtifactStore),
        (status = 400, description = "Key does not match the path"),
        (status = 404, description = "No such store"),
    ),
)]
pub async fn update_store(
    State(state): State<SharedState>,
    Path((package, store_type, name)): Path<(String, String, String)>,
    Json(store): Json<ArtifactStore>,
) -> Result<Json<ArtifactStore>> {
    let (package, store_type) = parse_types(&package, &store_type)?;
    let key = StoreKey::new(package, store_type, name)?;
    if store.key != key {
        return Err(AppError::Validation(format!(
            "body key {} does not match path key {key}",
            store.key
        )));
    }
    Ok(Json(state.stores.update(store).await?))
}

/// DELETE /api/admin/stores/:package/:store_type/:name
#[utoipa::path(
    delete,
    path = "/{package}/{store_type}/{name}",
    context_path = "/api/admin/stores",
    tag = "stores",
    operation_id = "delete_store",
    params(
        ("package" = String, Path, description = "Package type"),
        ("store_type" = String, Path, description = "Store type"),
        ("name" = String, Path, description = "Store name"),
    ),
    responses(
        (status = 204, description = "Store deleted"),
        (status = 404, description = "No such store"),
    ),
)]
pub async fn delete_store(
    State(state): State<SharedState>,
    Path((package, store_type, name)): Path<(String, String, String)>,
) -> Result<StatusCode> {
    let (package, store_type) = parse_types(&package, &store_type)?;
    let key = StoreKey::new(package, store_type, name)?;
    state.stores.delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}
