//! HTTP API: application state and router assembly.

pub mod handlers;
pub mod openapi;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::error::Result;
use crate::services::content_gateway::ContentGateway;
use crate::services::event_bus::EventBus;
use crate::services::promotion_service::PromotionService;
use crate::services::rule_registry::RuleRegistry;
use crate::services::store_service::StoreService;
use crate::services::validation::ValidationEngine;
use crate::storage::{ContentStorage, FsStorage};

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub stores: Arc<StoreService>,
    pub storage: Arc<dyn ContentStorage>,
    pub gateway: Arc<ContentGateway>,
    pub rules: Arc<RuleRegistry>,
    pub promotion: Arc<PromotionService>,
    pub events: Arc<EventBus>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire every service from the config, with filesystem storage.
    pub async fn from_config(config: Config) -> Result<Self> {
        let storage: Arc<dyn ContentStorage> = Arc::new(FsStorage::new(&config.storage_dir));
        Self::with_storage(config, storage).await
    }

    /// Wire every service over the given storage backend. Tests use this
    /// with the in-memory backend.
    pub async fn with_storage(config: Config, storage: Arc<dyn ContentStorage>) -> Result<Self> {
        let events = Arc::new(EventBus::new(256));
        let stores = Arc::new(StoreService::open(config.stores_dir(), events.clone())?);
        let gateway = Arc::new(ContentGateway::new(stores.clone(), storage.clone()));
        let rules = Arc::new(
            RuleRegistry::open(
                config.rules_dir(),
                config.rule_sets_dir(),
                config.ruleset_match,
            )
            .await?,
        );
        let engine = Arc::new(ValidationEngine::new(rules.clone()));
        let promotion = Arc::new(PromotionService::new(
            stores.clone(),
            gateway.clone(),
            engine,
            events.clone(),
            config.promote_workers,
            Duration::from_secs(config.promote_timeout_secs),
        ));

        Ok(Self {
            config,
            stores,
            storage,
            gateway,
            rules,
            promotion,
            events,
        })
    }
}

/// Assemble the full application router.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .nest("/api/promotion", handlers::promotion::router())
        .nest("/api/admin/validation", handlers::validation_admin::router())
        .nest("/api/admin/stores", handlers::stores::router())
        .nest("/api/content", handlers::content::router())
        .merge(handlers::health::router())
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::build_openapi()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
