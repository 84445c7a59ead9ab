//! Prism HTTP Clients
//!
//! Type-safe HTTP clients for the two services the conversion backend talks to:
//!
//! - [`ApiClient`]: the result-reporting API. The conversion service pushes
//!   run reports to it once a pipeline run finishes.
//! - [`ConversionClient`]: the conversion service itself. Used by the CLI to
//!   submit pipeline runs.
//!
//! # Example
//!
//! ```no_run
//! use prism_client::ConversionClient;
//! use prism_core::dto::pipeline::{Operation, PipelineRunRequest};
//!
//! #[tokio::main]
//! async fn main() -> prism_client::Result<()> {
//!     let client = ConversionClient::new("http://localhost:8083");
//!
//!     let request = PipelineRunRequest::new("snapshot-1", "/data/photo.tiff")
//!         .with_operation(Operation::Base64Thumbnail);
//!     client.run_pipeline(&request).await?;
//!     Ok(())
//! }
//! ```

mod conversion;
pub mod error;
mod snapshots;

pub use conversion::ConversionClient;
pub use error::{ClientError, Result};

use reqwest::Client;

/// HTTP client for the result-reporting API
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Base URL of the API (e.g., "http://localhost:8080")
    base_url: String,
    /// Bearer token sent with every request, if set
    api_key: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl ApiClient {
    /// Create a new API client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the API (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new API client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            client,
        }
    }

    /// Sets the bearer token used to authenticate against the API
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Get the base URL of the API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

// =============================================================================
// Response Handlers
// =============================================================================

/// Handle a response that returns no content
pub(crate) async fn handle_empty_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    Ok(())
}
