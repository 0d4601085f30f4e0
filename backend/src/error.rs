//! Error handling for the Stockroom server
//!
//! Every business-rule failure is detected before any mutation and mapped to
//! a specific kind; storage failures are logged and surfaced generically.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::StockShortfall;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid transaction kind: {0}")]
    InvalidTransactionKind(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("insufficient stock: {}", format_shortfalls(.0))]
    InsufficientStock(Vec<StockShortfall>),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Concurrency errors
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a field validation failure
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::InvalidTransactionKind(_) => "INVALID_TRANSACTION_KIND",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::InvalidTransactionKind(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateEntry(_) | AppError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            AppError::InsufficientStock(_) | AppError::InvalidState(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::DatabaseError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn format_shortfalls(shortfalls: &[StockShortfall]) -> String {
    shortfalls
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<shared::UnknownTransactionKind> for AppError {
    fn from(err: shared::UnknownTransactionKind) -> Self {
        AppError::InvalidTransactionKind(err.0)
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfalls: Option<Vec<StockShortfall>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, field, shortfalls) = match &self {
            AppError::Validation { field, message } => (message.clone(), Some(field.clone()), None),
            AppError::DuplicateEntry(field) => (
                format!("A record with this {} already exists", field),
                Some(field.clone()),
                None,
            ),
            AppError::NotFound(resource) => (format!("{} not found", resource), None, None),
            AppError::InsufficientStock(shortfalls) => {
                (self.to_string(), None, Some(shortfalls.clone()))
            }
            AppError::InvalidTransactionKind(_)
            | AppError::InvalidState(_)
            | AppError::ConcurrencyConflict(_) => (self.to_string(), None, None),
            AppError::DatabaseError(_) => ("A database error occurred".to_string(), None, None),
            AppError::Internal(_) => {
                ("An internal server error occurred".to_string(), None, None)
            }
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                field,
                shortfalls,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
