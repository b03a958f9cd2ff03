//! Store content API handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use utoipa::OpenApi;

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::{PackageType, StoreKey, StoreSpec, StoreType};
use crate::services::path_resolver::is_checksum_path;
use crate::services::rules::is_snapshot_path;
use crate::storage::digest;

#[derive(OpenApi)]
#[openapi(paths(get_content, put_content, delete_content))]
pub struct ContentApiDoc;

pub fn router() -> Router<SharedState> {
    // axum's `get` also answers HEAD with the body stripped.
    Router::new().route(
        "/:package/:store_type/:name/*path",
        get(get_content).put(put_content).delete(delete_content),
    )
}

fn store_key(package: &str, store_type: &str, name: &str) -> Result<StoreKey> {
    let package: PackageType = package.parse()?;
    let store_type: StoreType = store_type.parse()?;
    Ok(StoreKey::new(package, store_type, name)?)
}

/// GET (or HEAD) /api/content/:package/:store_type/:name/*path
#[utoipa::path(
    get,
    path = "/{package}/{store_type}/{name}/{path}",
    context_path = "/api/content",
    tag = "content",
    operation_id = "get_content",
    params(
        ("package" = String, Path, description = "Package type"),
        ("store_type" = String, Path, description = "Store type"),
        ("name" = String, Path, description = "Store name"),
        ("path" = String, Path, description = "Store-relative content path"),
    ),
    responses(
        (status = 200, description = "File bytes", content_type = "application/octet-stream"),
        (status = 404, description = "No such store or path"),
    ),
)]
pub async fn get_content(
    State(state): State<SharedState>,
    Path((package, store_type, name, path)): Path<(String, String, String, String)>,
) -> Result<impl IntoResponse> {
    let key = store_key(&package, &store_type, &name)?;
    match state.gateway.retrieve(&key, &path).await? {
        Some(bytes) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )),
        None => Err(AppError::NotFound(format!("{key}/{path}"))),
    }
}

/// PUT /api/content/:package/:store_type/:name/*path
///
/// Uploads land only in hosted stores. Checksum sidecars (`.md5`, `.sha1`,
/// `.sha256`) are written next to the file unless the upload is itself a
/// checksum.
#[utoipa::path(
    put,
    path = "/{package}/{store_type}/{name}/{path}",
    context_path = "/api/content",
    tag = "content",
    operation_id = "put_content",
    request_body(content_type = "application/octet-stream"),
    params(
        ("package" = String, Path, description = "Package type"),
        ("store_type" = String, Path, description = "Store type"),
        ("name" = String, Path, description = "Store name"),
        ("path" = String, Path, description = "Store-relative content path"),
    ),
    responses(
        (status = 201, description = "Stored"),
        (status = 400, description = "Non-hosted store, or store policy forbids the upload"),
        (status = 404, description = "No such store"),
    ),
)]
pub async fn put_content(
    State(state): State<SharedState>,
    Path((package, store_type, name, path)): Path<(String, String, String, String)>,
    body: Bytes,
) -> Result<StatusCode> {
    let key = store_key(&package, &store_type, &name)?;
    let store = state.stores.get(&key).await?;
    let StoreSpec::Hosted {
        allow_snapshots,
        allow_releases,
    } = store.spec
    else {
        return Err(AppError::Validation(format!(
            "uploads are only accepted by hosted stores, not {key}"
        )));
    };
    let snapshot = is_snapshot_path(&path);
    if snapshot && !allow_snapshots {
        return Err(AppError::Validation(format!(
            "store {key} does not accept snapshot uploads"
        )));
    }
    if !snapshot && !allow_releases {
        return Err(AppError::Validation(format!(
            "store {key} does not accept release uploads"
        )));
    }

    let sidecars = if is_checksum_path(&path) {
        None
    } else {
        Some(digest::sidecars(&body))
    };
    state.gateway.store(&key, &path, body).await?;
    if let Some(sidecars) = sidecars {
        for (ext, hexdigest) in sidecars {
            state
                .gateway
                .store(&key, &format!("{path}.{ext}"), hexdigest.into_bytes().into())
                .await?;
        }
    }
    Ok(StatusCode::CREATED)
}

/// DELETE /api/content/:package/:store_type/:name/*path
#[utoipa::path(
    delete,
    path = "/{package}/{store_type}/{name}/{path}",
    context_path = "/api/content",
    tag = "content",
    operation_id = "delete_content",
    params(
        ("package" = String, Path, description = "Package type"),
        ("store_type" = String, Path, description = "Store type"),
        ("name" = String, Path, description = "Store name"),
        ("path" = String, Path, description = "Store-relative content path"),
    ),
    responses(
        (status = 200, description = "Whether a file was removed", body = bool),
        (status = 400, description = "Cannot delete through a group"),
        (status = 404, description = "No such store"),
    ),
)]
pub async fn delete_content(
    State(state): State<SharedState>,
    Path((package, store_type, name, path)): Path<(String, String, String, String)>,
) -> Result<Json<bool>> {
    let key = store_key(&package, &store_type, &name)?;
    let removed = state.gateway.delete(&key, &path).await?;
    Ok(Json(removed))
}
