//! Health command handler

use anyhow::{Context, Result};
use colored::*;
use prism_client::ConversionClient;

use crate::config::Config;

/// Queries the service health endpoint
pub async fn check_health(config: &Config) -> Result<()> {
    let client = ConversionClient::new(&config.conversion_url);

    let status = client
        .health()
        .await
        .with_context(|| format!("Conversion service at {} is unreachable", client.base_url()))?;

    println!(
        "{} {} ({})",
        "✓".green().bold(),
        client.base_url().cyan(),
        status.trim()
    );
    Ok(())
}
