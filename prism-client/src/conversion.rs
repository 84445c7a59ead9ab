//! Conversion service endpoints

use prism_core::dto::pipeline::PipelineRunRequest;
use reqwest::Client;

use crate::error::{ClientError, Result};
use crate::handle_empty_response;

/// HTTP client for the conversion service
#[derive(Debug, Clone)]
pub struct ConversionClient {
    /// Base URL of the conversion service (e.g., "http://localhost:8083")
    base_url: String,
    client: Client,
}

impl ConversionClient {
    /// Create a new conversion client
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a pipeline run
    ///
    /// The service acknowledges immediately once the request is accepted;
    /// the run's outcome is delivered to the reporting API, not returned here.
    /// A rejected request surfaces as a 400 [`crate::ClientError::ApiError`].
    pub async fn run_pipeline(&self, request: &PipelineRunRequest) -> Result<()> {
        let url = format!("{}/v2/pipelines/run", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;

        handle_empty_response(response).await
    }

    /// Check service health
    ///
    /// # Returns
    /// The body of the health endpoint
    pub async fn health(&self) -> Result<String> {
        let url = format!("{}/v2/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::api_error(status.as_u16(), body));
        }

        Ok(body)
    }
}
