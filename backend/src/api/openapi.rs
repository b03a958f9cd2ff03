//! OpenAPI specification generated from handler annotations via utoipa.

use utoipa::OpenApi;

/// Top-level OpenAPI document for the sluice API.
///
/// Each handler module contributes its own paths and schemas via per-module
/// `#[derive(OpenApi)]` structs that are merged into this root document at
/// startup.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "sluice API",
        description = "Artifact store promotion service: stores, content, and validated promotion.",
        version = "0.4.1",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    tags(
        (name = "promotion", description = "Paths and group promotion, dry-run, and rollback"),
        (name = "validation", description = "Promotion validation rule and rule-set administration"),
        (name = "stores", description = "Store definition CRUD and group membership"),
        (name = "content", description = "Store content access"),
        (name = "health", description = "Health and readiness checks"),
    ),
    components(schemas(ErrorResponse))
)]
pub struct ApiDoc;

/// Standard error response body returned by all endpoints on failure.
#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g. "NOT_FOUND", "VALIDATION_ERROR")
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// Build the merged OpenAPI document from all handler modules.
pub fn build_openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.merge(super::handlers::promotion::PromotionApiDoc::openapi());
    doc.merge(super::handlers::validation_admin::ValidationAdminApiDoc::openapi());
    doc.merge(super::handlers::stores::StoresApiDoc::openapi());
    doc.merge(super::handlers::content::ContentApiDoc::openapi());
    doc.merge(super::handlers::health::HealthApiDoc::openapi());
    doc
}
