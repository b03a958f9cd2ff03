//! API handler modules, one per resource area.

pub mod content;
pub mod health;
pub mod promotion;
pub mod stores;
pub mod validation_admin;
