use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;

use crate::models::BookingStatus;
use crate::services::availability::AvailabilityError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("the requested dates are already booked")]
    DateConflict { conflicting: Vec<String> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("not allowed: {0}")]
    Unauthorized(String),

    #[error("cannot move booking from {} to {}", from.as_str(), to.as_str())]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("upstream service error: {0}")]
    Upstream(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRange { .. } => "invalid_range",
            AppError::DateConflict { .. } => "date_conflict",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::Validation(_) => "validation",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::InvalidSignature => "invalid_signature",
            AppError::Upstream(_) => "upstream_failure",
            AppError::Database(_) | AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRange { .. } => StatusCode::BAD_REQUEST,
            AppError::DateConflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::InvalidSignature => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::InvalidRange { start, end } => AppError::InvalidRange { start, end },
            AvailabilityError::DateConflict { conflicting } => AppError::DateConflict { conflicting },
            AvailabilityError::OutsideCalendar | AvailabilityError::TooLong { .. } => {
                AppError::Validation(err.to_string())
            }
            AvailabilityError::PriceOverflow => {
                AppError::Validation("booking total is too large".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let AppError::DateConflict { conflicting } = &self {
            body["conflicting_booking_ids"] = serde_json::json!(conflicting);
        }

        (status, axum::Json(body)).into_response()
    }
}
