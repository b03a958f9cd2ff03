//! Business logic services.

pub mod content_gateway;
pub mod event_bus;
pub mod path_resolver;
pub mod promotion_service;
pub mod rule_registry;
pub mod rules;
pub mod store_service;
pub mod validation;
