use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::types::{ApiErrorCode, ApiErrorResponse};

#[derive(Debug)]
pub enum ApiError {
    InvalidAmount(String),
    InvalidCurrency(String),
    ProcessorUnavailable(String),
    SignatureMismatch,
    StaleEvent,
    Validation(String),
    Unauthorized(String),
    NotFound(String),
    Db(sqlx::Error),
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::InvalidAmount(message) => {
                (StatusCode::BAD_REQUEST, ApiErrorCode::InvalidAmount, message)
            }
            ApiError::InvalidCurrency(message) => (
                StatusCode::BAD_REQUEST,
                ApiErrorCode::InvalidCurrency,
                message,
            ),
            ApiError::ProcessorUnavailable(message) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorCode::RemoteProcessorUnavailable,
                message,
            ),
            // Verification failures carry fixed messages so no internal
            // detail reaches the sender.
            ApiError::SignatureMismatch => (
                StatusCode::BAD_REQUEST,
                ApiErrorCode::SignatureMismatch,
                "webhook signature verification failed".to_string(),
            ),
            ApiError::StaleEvent => (
                StatusCode::BAD_REQUEST,
                ApiErrorCode::StaleEvent,
                "event timestamp outside tolerance window".to_string(),
            ),
            ApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, ApiErrorCode::Validation, message)
            }
            ApiError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ApiErrorCode::Unauthorized,
                message,
            ),
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, ApiErrorCode::NotFound, message)
            }
            ApiError::Db(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorCode::Database,
                "database error".to_string(),
            ),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorCode::Internal,
                message,
            ),
        };

        (status, Json(ApiErrorResponse { code, message })).into_response()
    }
}
