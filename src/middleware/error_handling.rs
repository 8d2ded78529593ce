// ============================================================================
// Error Handling - Application Error Taxonomy
// ============================================================================
//
// Internal errors (database, bcrypt, JWT internals) are logged server-side
// with full detail and returned to clients as generic messages. Upstream ERP
// failures keep their remote message: callers need to know whether Odoo was
// unreachable (503) or rejected the call (502).
//
// ============================================================================

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] JsonRejection),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // Odoo could not be reached at all (network error or timeout)
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    // Odoo answered with an application-level error object
    #[error("Upstream error: {0}")]
    Upstream(String),

    // Session login for the pricing report flow failed
    #[error("Upstream authentication failed: {0}")]
    UpstreamAuth(String),

    // A write reported an empty or failed response
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<crate::services::odoo::OdooError> for AppError {
    fn from(err: crate::services::odoo::OdooError) -> Self {
        use crate::services::odoo::OdooError;
        match err {
            OdooError::Unavailable(e) => AppError::UpstreamUnavailable(e.to_string()),
            OdooError::Rpc(msg) => AppError::Upstream(msg),
            OdooError::SessionAuth(msg) => AppError::UpstreamAuth(msg),
            OdooError::MalformedResponse(msg) => AppError::Upstream(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation failed".to_string()),
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "Invalid JSON".to_string()),
            AppError::Jwt(ref e) => {
                tracing::error!("JWT error: {:?}", e);
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            }
            AppError::PasswordHash(ref e) => {
                tracing::error!("Password hashing error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Password processing error".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::UpstreamUnavailable(msg) => {
                tracing::error!("Odoo unreachable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    format!("Error de conexión con Odoo: {}", msg),
                )
            }
            AppError::Upstream(msg) => {
                tracing::error!("Odoo application error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::UpstreamAuth(ref msg) => {
                tracing::error!("Odoo session authentication failed: {}", msg);
                (StatusCode::BAD_GATEWAY, "Error de autenticación en Odoo".to_string())
            }
            AppError::Persistence(msg) => {
                tracing::error!("Persistence error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
