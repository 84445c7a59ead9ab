//! Snapshot reporting endpoints

use prism_core::domain::report::PipelineReport;

use crate::error::Result;
use crate::{ApiClient, handle_empty_response};

impl ApiClient {
    /// Push the outcome of a pipeline run to the snapshot it belongs to
    ///
    /// # Arguments
    /// * `report` - Terminal report; `report.snapshot_id` selects the snapshot
    pub async fn patch_snapshot(&self, report: &PipelineReport) -> Result<()> {
        let url = snapshot_url(&self.base_url, &report.snapshot_id);
        tracing::debug!("PATCH {} ({})", url, report.status);

        let response = self
            .authorize(self.client.patch(&url))
            .json(report)
            .send()
            .await?;

        handle_empty_response(response).await
    }
}

fn snapshot_url(base_url: &str, snapshot_id: &str) -> String {
    format!("{}/v2/snapshots/{}/conversion", base_url, snapshot_id)
}
