use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::models::api::ErrorBody;
use crate::services::booking::BookingError;
use crate::services::workflow::CompletionError;

/// Failure returned by a technician API handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CompletionError> for ApiError {
    fn from(err: CompletionError) -> Self {
        let message = err.to_string();
        match err {
            CompletionError::IllegalTransition(_) => {
                ApiError::new(StatusCode::CONFLICT, "illegal_transition", message)
            }
            CompletionError::EmptyCode => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "empty_code", message)
            }
            CompletionError::NoSession(_) => ApiError::new(StatusCode::NOT_FOUND, "no_session", message),
            CompletionError::JobNotFound(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "job_not_found", message)
            }
            CompletionError::NetworkFailure => {
                ApiError::new(StatusCode::BAD_GATEWAY, "network_failure", message)
            }
            CompletionError::InvalidCode => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "invalid_code", message)
            }
            CompletionError::CodeExpired => ApiError::new(StatusCode::GONE, "code_expired", message),
            CompletionError::Rejected(_) => ApiError::new(StatusCode::CONFLICT, "rejected", message),
            CompletionError::Superseded => ApiError::new(StatusCode::CONFLICT, "superseded", message),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound(m) => ApiError::new(StatusCode::NOT_FOUND, "job_not_found", m),
            other => ApiError::new(StatusCode::BAD_GATEWAY, "network_failure", other.reason()),
        }
    }
}

impl From<garde::Report> for ApiError {
    fn from(report: garde::Report) -> Self {
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "invalid_request", report.to_string())
    }
}
