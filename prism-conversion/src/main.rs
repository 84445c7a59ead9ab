//! Prism Conversion Service
//!
//! Executes file-conversion pipelines against local source files.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Invoker: Runs ImageMagick and exiftool as child processes
//! - Processors: Operation sets per file type, looked up through a registry
//! - Scheduler: Bounded, fire-and-forget execution of pipeline runs
//! - Reporter: Delivers terminal run reports to the snapshot API
//!
//! Requests arrive over HTTP, are validated and scheduled immediately, and
//! their outcome is reported asynchronously.

mod api;
mod config;
mod error;
mod files;
mod identifier;
mod invoker;
mod processor;
mod registry;
mod reporter;
mod scheduler;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::identifier::FileIdentifier;
use crate::invoker::{CommandInvoker, ToolInvoker, probe};
use crate::processor::ImageProcessor;
use crate::registry::ProcessorRegistry;
use crate::reporter::{ApiReporter, LogReporter, ResultReporter};
use crate::scheduler::Scheduler;
use prism_client::ApiClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prism_conversion=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Prism Conversion Service");

    let config = load_config()?;
    info!(
        "Loaded configuration: bind_addr={}, max_parallel_runs={}, run_timeout={:?}",
        config.bind_addr, config.max_parallel_runs, config.run_timeout
    );

    let invoker: Arc<dyn ToolInvoker> = Arc::new(CommandInvoker::new());
    probe_tools(invoker.as_ref(), &config).await;

    let mut registry = ProcessorRegistry::new(FileIdentifier::new());
    registry.register(Arc::new(ImageProcessor::new(
        invoker,
        config.limits,
        config.tools.clone(),
        config.temp_dir.clone(),
    )));
    info!("Registered processors for: {:?}", registry.file_types());

    let reporter: Arc<dyn ResultReporter> = match &config.api_url {
        Some(url) => {
            let mut client = ApiClient::new(url.clone());
            if let Some(key) = &config.api_key {
                client = client.with_api_key(key.clone());
            }
            info!("Reporting results to {}", url);
            Arc::new(ApiReporter::new(client))
        }
        None => {
            warn!("API_URL not set, run reports will only be logged");
            Arc::new(LogReporter)
        }
    };

    let scheduler = Arc::new(Scheduler::new(
        config.scheduler(),
        Arc::new(registry),
        reporter,
    ));

    let app = api::create_router(Arc::clone(&scheduler));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler.shutdown().await;
    info!("Prism Conversion Service stopped");
    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<Config> {
    let config = Config::from_env();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Warns about external tools that cannot be started
async fn probe_tools(invoker: &dyn ToolInvoker, config: &Config) {
    let tools = [
        (config.tools.identify.as_str(), "-version"),
        (config.tools.convert.as_str(), "-version"),
        (config.tools.exiftool.as_str(), "-ver"),
    ];

    for (program, version_arg) in tools {
        match probe(invoker, program, version_arg).await {
            Ok(version) => info!("Found {}: {}", program, version),
            Err(e) => warn!("External tool unavailable: {}", e),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
