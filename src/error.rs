use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors surfaced by the ledger, its stores and its HTTP layer.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Missing required field or un-coercible number
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown site, statement, line, amendment, base order or subcontract order
    #[error("Not found: {0}")]
    NotFound(String),

    /// Mutation of a finalized statement, deletion of a non-tail statement, lost update
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation disabled by configuration
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        LedgerError::NotFound(what.to_string())
    }

    pub fn conflict(what: impl std::fmt::Display) -> Self {
        LedgerError::Conflict(what.to_string())
    }

    pub fn validation(what: impl std::fmt::Display) -> Self {
        LedgerError::Validation(what.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            LedgerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Conflict(_) => StatusCode::CONFLICT,
            LedgerError::Unauthorized(_) => StatusCode::FORBIDDEN,
            LedgerError::Database(_)
            | LedgerError::Migration(_)
            | LedgerError::Config(_)
            | LedgerError::Csv(_)
            | LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let status = self.status();
        // Store and migration errors stay in the log.
        let body = if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
            ErrorResponse {
                error: "Internal server error".to_string(),
            }
        } else {
            tracing::warn!(status = status.as_u16(), "{}", self);
            ErrorResponse {
                error: self.to_string(),
            }
        };

        (status, Json(body)).into_response()
    }
}
