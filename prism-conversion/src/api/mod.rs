//! API Module
//!
//! HTTP boundary of the conversion service. Handlers only translate between
//! JSON and the scheduler.

pub mod error;
pub mod health;
pub mod pipeline;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::scheduler::Scheduler;

/// Create the API router with all endpoints
pub fn create_router(scheduler: Arc<Scheduler>) -> Router {
    Router::new()
        .route("/v2/health", get(health::health_check))
        .route("/v2/pipelines/run", post(pipeline::run_pipeline))
        .with_state(scheduler)
        .layer(TraceLayer::new_for_http())
}
