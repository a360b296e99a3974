//! Error taxonomy.
//!
//! Three layers: `StoreError` (persistence), `MutationError` (nested-entity
//! path lookup), and `ApiError` (what the HTTP surface returns). Account
//! errors (NotFound/Conflict/InvalidCredentials) surface to the user;
//! persistence failures are logged and returned as a generic server error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

/// Errors from the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("user already exists: {0}")]
    Conflict(String),

    #[error("incorrect password")]
    InvalidCredentials,

    #[error("invalid username: {0:?}")]
    InvalidUsername(String),

    #[error("corrupt state file for {user}: {detail}")]
    Corrupt { user: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A mutation path that did not resolve. The original UI swallowed these;
/// here the caller gets the miss and decides whether to ignore it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("client not found: {0}")]
    ClientNotFound(String),

    #[error("entity path not found: {0}")]
    PathNotFound(String),
}

/// Errors the HTTP surface maps onto status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Incorrect password")]
    InvalidCredentials,

    #[error("Server error")]
    Server,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidCredentials => StatusCode::FORBIDDEN,
            ApiError::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::UserNotFound(_) => ApiError::NotFound("User not found".to_string()),
            StoreError::Conflict(_) => ApiError::Conflict("User already exists".to_string()),
            StoreError::InvalidCredentials => ApiError::InvalidCredentials,
            StoreError::InvalidUsername(u) => {
                ApiError::BadRequest(format!("Invalid username: {u}"))
            }
            StoreError::Corrupt { .. } | StoreError::Io(_) => {
                tracing::error!(error = %err, "persistence failure");
                ApiError::Server
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
