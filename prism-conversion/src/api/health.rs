//! Health Check API Handler

use axum::{http::StatusCode, response::IntoResponse};

/// GET /v2/health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
