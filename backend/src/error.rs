//! Application error types and result alias.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::key::{KeyParseError, StoreKey};

/// Application result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure of the promotion *machinery* — listing content, executing a
/// validation rule, or waiting on the copy pool. Distinct from a rule
/// rejecting a promotion, which is a normal business result.
#[derive(Error, Debug)]
pub enum PromotionError {
    #[error("content listing failed for {store}: {message}")]
    Listing { store: StoreKey, message: String },

    #[error("validation rule '{rule}' failed to execute: {message}")]
    RuleExecution { rule: String, message: String },

    #[error("promotion timed out after {elapsed_secs}s; completed paths remain valid")]
    Timeout { elapsed_secs: u64 },
}

impl PromotionError {
    pub fn listing(store: &StoreKey, message: impl Into<String>) -> Self {
        Self::Listing {
            store: store.clone(),
            message: message.into(),
        }
    }

    pub fn rule_execution(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RuleExecution {
            rule: rule.into(),
            message: message.into(),
        }
    }
}

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Duplicate resource (e.g., store definition already exists)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid store key: {0}")]
    Key(#[from] KeyParseError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Promotion error: {0}")]
    Promotion(#[from] PromotionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Map error variant to HTTP status code and machine-readable error code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Key(_) => (StatusCode::BAD_REQUEST, "INVALID_STORE_KEY"),
            Self::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            Self::Promotion(PromotionError::Timeout { .. }) => {
                (StatusCode::GATEWAY_TIMEOUT, "PROMOTION_TIMEOUT")
            }
            Self::Promotion(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PROMOTION_ERROR"),
            Self::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Self::AddrParse(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ADDR_PARSE_ERROR"),
            Self::Json(_) => (StatusCode::BAD_REQUEST, "JSON_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Return a user-facing message. Internal details are hidden for
    /// server-side errors to avoid leaking filesystem paths or config
    /// values. The full error is still logged via `tracing::error!` in
    /// `into_response`.
    fn user_message(&self) -> String {
        match self {
            // Server-side errors: return generic messages (details are logged)
            Self::Storage(_) => "Storage operation failed".to_string(),
            Self::Config(_) => "Server configuration error".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Io(_) => "IO operation failed".to_string(),
            Self::AddrParse(_) => "Invalid address".to_string(),
            Self::Promotion(PromotionError::Timeout { .. }) => {
                "Promotion timed out; completed paths remain valid".to_string()
            }
            Self::Promotion(PromotionError::Listing { store, .. }) => {
                format!("Content listing failed for {}", store)
            }
            Self::Promotion(PromotionError::RuleExecution { rule, .. }) => {
                format!("Validation rule '{}' failed to execute", rule)
            }
            // Client-facing errors: pass through their message
            Self::NotFound(msg) | Self::Conflict(msg) | Self::Validation(msg) => msg.clone(),
            Self::Key(e) => e.to_string(),
            Self::Json(_) => "Invalid JSON".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.user_message();

        tracing::error!(error = %self, code = code, "Request error");

        let body = Json(json!({
            "code": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}
