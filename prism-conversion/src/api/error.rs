//! API Error Handling
//!
//! Every rejection is a `400` with a body of the form
//! `{"error": "...", "fields": [{"field": "...", "message": "..."}]}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use prism_core::{FieldError, ValidationError};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    /// Body was not a well-formed run request
    MalformedBody(String),
    /// Request parsed but failed validation
    Invalid(ValidationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (message, fields): (String, Vec<FieldError>) = match self {
            ApiError::MalformedBody(msg) => (msg, Vec::new()),
            ApiError::Invalid(err) => (err.to_string(), err.fields),
        };
        tracing::debug!("Rejected request: {}", message);

        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": message, "fields": fields })),
        )
            .into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Invalid(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
