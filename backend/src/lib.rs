//! sluice — artifact store promotion service.
//!
//! Manages remote/hosted/group store definitions, serves and accepts store
//! content, and promotes content paths between stores behind an ordered
//! validation-rule pipeline with dry-run, partial-failure accounting, and
//! rollback.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
