//! Validation rule administration API handlers.

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use utoipa::OpenApi;

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::StoreKey;
use crate::services::rule_registry::{RuleInfo, ValidationRuleSet};

#[derive(OpenApi)]
#[openapi(
    paths(
        reload,
        list_rules,
        get_rule,
        list_rule_sets,
        get_rule_set,
        rule_set_for_store_key
    ),
    components(schemas(RuleInfo, ValidationRuleSet))
)]
pub struct ValidationAdminApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/reload/:target", put(reload))
        .route("/rules/all", get(list_rules))
        .route("/rules/named/:name", get(get_rule))
        .route("/rulesets/all", get(list_rule_sets))
        .route("/rulesets/named/:name", get(get_rule_set))
        .route("/rulesets/storekey/:key", get(rule_set_for_store_key))
}

/// PUT /api/admin/validation/reload/{rules|rulesets|all}
#[utoipa::path(
    put,
    path = "/reload/{target}",
    context_path = "/api/admin/validation",
    tag = "validation",
    operation_id = "reload_validation",
    params(("target" = String, Path, description = "What to reload: rules, rulesets, or all")),
    responses(
        (status = 200, description = "Reload performed", body = bool),
        (status = 400, description = "Unknown reload target"),
    ),
)]
pub async fn reload(
    State(state): State<SharedState>,
    Path(target): Path<String>,
) -> Result<Json<bool>> {
    match target.as_str() {
        "rules" => {
            state.rules.reload_rules().await?;
        }
        "rulesets" => {
            state.rules.reload_rule_sets().await?;
        }
        "all" => {
            state.rules.reload_all().await?;
        }
        other => {
            return Err(AppError::Validation(format!(
                "unknown reload target '{other}' (expected rules, rulesets, or all)"
            )))
        }
    }
    Ok(Json(true))
}

/// GET /api/admin/validation/rules/all
#[utoipa::path(
    get,
    path = "/rules/all",
    context_path = "/api/admin/validation",
    tag = "validation",
    operation_id = "list_validation_rules",
    responses((status = 200, description = "Registered rules", body = [RuleInfo])),
)]
pub async fn list_rules(State(state): State<SharedState>) -> Result<Json<Vec<RuleInfo>>> {
    Ok(Json(state.rules.rule_infos().await))
}

/// GET /api/admin/validation/rules/named/:name
#[utoipa::path(
    get,
    path = "/rules/named/{name}",
    context_path = "/api/admin/validation",
    tag = "validation",
    operation_id = "get_validation_rule",
    params(("name" = String, Path, description = "Registered rule name")),
    responses(
        (status = 200, description = "Rule info", body = RuleInfo),
        (status = 404, description = "No rule under that name"),
    ),
)]
pub async fn get_rule(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<RuleInfo>> {
    state
        .rules
        .rule_infos()
        .await
        .into_iter()
        .find(|info| info.name == name)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("validation rule {name}")))
}

/// GET /api/admin/validation/rulesets/all
#[utoipa::path(
    get,
    path = "/rulesets/all",
    context_path = "/api/admin/validation",
    tag = "validation",
    operation_id = "list_validation_rule_sets",
    responses((status = 200, description = "Loaded rule-sets", body = [ValidationRuleSet])),
)]
pub async fn list_rule_sets(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ValidationRuleSet>>> {
    let sets = state
        .rules
        .rule_sets()
        .await
        .iter()
        .map(|rs| (**rs).clone())
        .collect();
    Ok(Json(sets))
}

/// GET /api/admin/validation/rulesets/named/:name
#[utoipa::path(
    get,
    path = "/rulesets/named/{name}",
    context_path = "/api/admin/validation",
    tag = "validation",
    operation_id = "get_validation_rule_set",
    params(("name" = String, Path, description = "Rule-set name")),
    responses(
        (status = 200, description = "Rule-set", body = ValidationRuleSet),
        (status = 404, description = "No rule-set under that name"),
    ),
)]
pub async fn get_rule_set(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<ValidationRuleSet>> {
    state
        .rules
        .rule_set_named(&name)
        .await
        .map(|rs| Json((*rs).clone()))
        .ok_or_else(|| AppError::NotFound(format!("validation rule-set {name}")))
}

/// GET /api/admin/validation/rulesets/storekey/:key - the rule-set that
/// would gate promotions into the given target store
#[utoipa::path(
    get,
    path = "/rulesets/storekey/{key}",
    context_path = "/api/admin/validation",
    tag = "validation",
    operation_id = "rule_set_for_store_key",
    params(("key" = String, Path, description = "Target store key, e.g. maven:hosted:releases")),
    responses(
        (status = 200, description = "Matching rule-set", body = ValidationRuleSet),
        (status = 404, description = "No rule-set matches the key"),
    ),
)]
pub async fn rule_set_for_store_key(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Json<ValidationRuleSet>> {
    let key: StoreKey = key.parse()?;
    state
        .rules
        .rule_set_matching(&key)
        .await
        .map(|rs| Json((*rs).clone()))
        .ok_or_else(|| AppError::NotFound(format!("no rule-set matches {key}")))
}
