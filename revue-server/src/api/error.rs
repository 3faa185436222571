use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use revue_types::ErrorResponse;

use crate::db::DbError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failure classes, reported with PostgreSQL/PostgREST style codes so clients
/// can tell them apart without parsing messages
pub mod codes {
    pub const MISSING_PROCEDURE: &str = "PGRST202";
    pub const INVALID_TEXT_REPRESENTATION: &str = "22P02";
    pub const INVALID_PARAMETER_VALUE: &str = "22023";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const NO_DATA_FOUND: &str = "P0002";
    pub const INSUFFICIENT_PRIVILEGE: &str = "42501";
    pub const INVALID_CREDENTIALS: &str = "PGRST301";
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    /// No procedure is registered under the requested name
    MissingProcedure(String),
    /// Params could not be read as the procedure's parameter type
    InvalidParams(String),
    ForeignKey(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code, details) = match self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "Not Found",
                codes::NO_DATA_FOUND,
                msg,
            ),
            ApiError::MissingProcedure(name) => (
                StatusCode::NOT_FOUND,
                "Could not find the function",
                codes::MISSING_PROCEDURE,
                format!("no procedure named '{}'", name),
            ),
            ApiError::InvalidParams(msg) => (
                StatusCode::BAD_REQUEST,
                "Invalid parameters",
                codes::INVALID_TEXT_REPRESENTATION,
                msg,
            ),
            ApiError::ForeignKey(msg) => (
                StatusCode::CONFLICT,
                "Foreign key violation",
                codes::FOREIGN_KEY_VIOLATION,
                msg,
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "Bad Request",
                codes::INVALID_PARAMETER_VALUE,
                msg,
            ),
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                codes::INVALID_CREDENTIALS,
                msg,
            ),
            ApiError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                codes::INSUFFICIENT_PRIVILEGE,
                msg,
            ),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                let response = ErrorResponse {
                    error: "Internal Server Error".to_string(),
                    details: Some("An unexpected error occurred".to_string()),
                    code: None,
                };
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response();
            }
        };

        let error_response = ErrorResponse {
            error: message.to_string(),
            details: Some(details),
            code: Some(code.to_string()),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => ApiError::NotFound(msg),
            DbError::ForeignKey(msg) => ApiError::ForeignKey(msg),
            DbError::Invalid(msg) => ApiError::BadRequest(msg),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
