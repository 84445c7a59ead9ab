//! Result reporting
//!
//! Terminal run reports leave the core through a [`ResultReporter`]. In
//! production that is the snapshot API; without an API URL reports are only
//! logged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use prism_client::ApiClient;
use prism_core::domain::report::PipelineReport;
use tracing::{info, warn};

/// Receives the terminal report of every run
#[async_trait]
pub trait ResultReporter: Send + Sync {
    async fn report(&self, report: &PipelineReport) -> Result<()>;
}

/// Reports to the snapshot API
pub struct ApiReporter {
    client: ApiClient,
}

impl ApiReporter {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResultReporter for ApiReporter {
    async fn report(&self, report: &PipelineReport) -> Result<()> {
        self.client
            .patch_snapshot(report)
            .await
            .with_context(|| format!("Failed to report snapshot {}", report.snapshot_id))
    }
}

/// Logs reports instead of sending them anywhere
#[derive(Debug, Default)]
pub struct LogReporter;

#[async_trait]
impl ResultReporter for LogReporter {
    async fn report(&self, report: &PipelineReport) -> Result<()> {
        match &report.error {
            None => info!(
                snapshot_id = %report.snapshot_id,
                "Run {} with {} artifact(s)",
                report.status,
                report.artifacts.len()
            ),
            Some(failure) => warn!(
                snapshot_id = %report.snapshot_id,
                "Run {} in {}: {}",
                report.status,
                failure.operation.as_deref().unwrap_or("dispatch"),
                failure.message
            ),
        }
        Ok(())
    }
}
