use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::{BookingStatus, CarStatus};

/// Application error taxonomy. Every variant except `Storage` is an
/// expected, caller-recoverable condition.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("car is currently {0}")]
    CarNotAvailable(CarStatus),

    #[error("car is not available for the selected dates")]
    DateRangeConflict,

    #[error("cannot change status from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("booking is already {0}")]
    AlreadyTerminal(BookingStatus),

    #[error("car is referenced by existing records and cannot be deleted")]
    CarInUse,

    #[error("forbidden")]
    Forbidden,

    #[error("missing actor identity")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Storage(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidDateRange(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CarNotAvailable(_) => StatusCode::CONFLICT,
            AppError::DateRangeConflict => StatusCode::CONFLICT,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::AlreadyTerminal(_) => StatusCode::CONFLICT,
            AppError::CarInUse => StatusCode::CONFLICT,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let AppError::Storage(e) = &self {
            tracing::error!(error = %e, "storage error");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
