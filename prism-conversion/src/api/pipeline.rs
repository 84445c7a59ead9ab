//! Pipeline API Handlers

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use prism_core::dto::pipeline::PipelineRunRequest;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::scheduler::Scheduler;

/// POST /v2/pipelines/run
/// Accept a pipeline run; the outcome is delivered through the reporter
pub async fn run_pipeline(
    State(scheduler): State<Arc<Scheduler>>,
    body: Result<Json<PipelineRunRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = body?;
    tracing::info!(
        "Received pipeline run {} ({} operation(s))",
        req.snapshot_id,
        req.operations.len()
    );

    scheduler.schedule(req)?;
    Ok(StatusCode::OK)
}
