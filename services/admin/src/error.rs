//! Errors raised by the role service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for role operations
#[derive(Error, Debug)]
pub enum RoleError {
    /// Input rejected before reaching the database
    #[error("{0}")]
    BadRequest(String),

    /// A referenced role, menu or data rule does not exist
    #[error("{0}")]
    NotFound(String),

    /// A role name is already taken
    #[error("{0}")]
    Conflict(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] common::error::DatabaseError),
}

impl RoleError {
    pub(crate) fn role_not_found() -> Self {
        RoleError::NotFound("role not found".to_string())
    }

    pub(crate) fn role_exists() -> Self {
        RoleError::Conflict("role already exists".to_string())
    }
}

impl IntoResponse for RoleError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            RoleError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            RoleError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            RoleError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            RoleError::Database(e) => {
                error!("Role operation failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for role service results
pub type RoleResult<T> = Result<T, RoleError>;
