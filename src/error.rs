//! Error types and error handling for the application
//!
//! Each concern defines its own error enum; they all convert into [`AppError`],
//! which implements `IntoResponse` for consistent error formatting.

use crate::chat::runtime::RuntimeError;
use crate::chat::store::StoreError;
use crate::workbook::ledger::LedgerError;
use crate::workbook::lookup::LookupError;
use crate::workbook::payload::ValidationError;
use crate::workbook::template::TemplateError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Rent payload failed schema validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Request body could not be understood
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Route or resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Conversation store lookup failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Local ledger missing or unreadable
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Template missing or workbook generation failed
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Vector-store lookup failed
    #[error("Rent data lookup failed: {0}")]
    Lookup(#[from] LookupError),

    /// Agent runtime returned an error
    #[error("Agent runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status and client-facing message
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::NotFound(_) | AppError::Store(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Ledger(LedgerError::Missing(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Ledger(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Local data error: {}", e),
            ),
            AppError::Template(TemplateError::Missing(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Template(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Workbook generation failed: {}", e),
            ),
            AppError::Lookup(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Runtime(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %error_message, "Request failed");
        }

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
