//! Error types shared by handlers and the layers below them.
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl turns an
//! error into a status code plus a `{"error": ..., "details"?: ...}` body.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("duplicate key: {0}")]
    Duplicate(String),
}

/// Failures talking to an upstream HTTP service (model or evaluator).
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid upstream payload: {0}")]
    Payload(String),
}

impl UpstreamError {
    /// The most specific message the upstream gave us.
    pub fn detail(&self) -> String {
        match self {
            UpstreamError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
    /// Generic 500 with an optional detail string exposed to the caller.
    #[error("{message}")]
    Internal {
        message: String,
        details: Option<String>,
    },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal { message: message.into(), details: None }
    }

    pub fn internal_with(message: impl Into<String>, details: impl Into<String>) -> Self {
        ApiError::Internal { message: message.into(), details: Some(details.into()) }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Internal { message, details: Some(d) } => json!({ "error": message, "details": d }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
