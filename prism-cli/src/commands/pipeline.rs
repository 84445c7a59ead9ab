//! Pipeline command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use prism_core::dto::pipeline::{Operation, PipelineRunRequest};
use std::collections::HashMap;

use crate::config::Config;
use prism_client::ConversionClient;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Submit a pipeline run for a source file
    Run {
        /// Snapshot the results are reported against
        #[arg(long)]
        snapshot_id: String,

        /// Path of the source file, as seen by the service
        #[arg(long)]
        source: String,

        /// Pipeline identifier, for correlation only
        #[arg(long)]
        pipeline_id: Option<String>,

        /// Operations in order (e.g. measure, resize:800x, convert:jpg);
        /// the processor's defaults run when none is given
        #[arg(long = "op", value_parser = parse_operation)]
        operations: Vec<Operation>,

        /// Opaque payload entries as key=value pairs
        #[arg(long, value_parser = parse_key_val)]
        payload: Vec<(String, String)>,

        /// Print the request instead of submitting it
        #[arg(long)]
        dry_run: bool,
    },
}

/// Parse a single key=value pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    if key.trim().is_empty() {
        anyhow::bail!("invalid KEY=value: empty key in `{}`", s);
    }
    Ok((key.trim().to_string(), value.to_string()))
}

fn parse_operation(s: &str) -> Result<Operation, String> {
    s.parse()
}

/// Routes pipeline subcommands to their handlers
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    match command {
        PipelineCommands::Run {
            snapshot_id,
            source,
            pipeline_id,
            operations,
            payload,
            dry_run,
        } => {
            let request = build_request(snapshot_id, source, pipeline_id, operations, payload);
            if dry_run {
                println!("{}", serde_json::to_string_pretty(&request)?);
                return Ok(());
            }
            let client = ConversionClient::new(&config.conversion_url);
            run_pipeline(&client, request).await
        }
    }
}

fn build_request(
    snapshot_id: String,
    source: String,
    pipeline_id: Option<String>,
    operations: Vec<Operation>,
    payload: Vec<(String, String)>,
) -> PipelineRunRequest {
    PipelineRunRequest {
        pipeline_id,
        snapshot_id,
        source,
        operations,
        payload: payload.into_iter().collect::<HashMap<_, _>>(),
    }
}

/// Validates locally, then submits the run
async fn run_pipeline(client: &ConversionClient, request: PipelineRunRequest) -> Result<()> {
    if let Err(e) = request.validate() {
        for field in &e.fields {
            eprintln!("  {} {}", field.field.red().bold(), field.message);
        }
        return Err(e.into());
    }

    client
        .run_pipeline(&request)
        .await
        .context("Failed to submit pipeline run")?;

    println!("{}", "✓ Pipeline run accepted".green().bold());
    println!("  Snapshot:   {}", request.snapshot_id.cyan());
    println!("  Source:     {}", request.source);
    if request.operations.is_empty() {
        println!("  Operations: {}", "processor defaults".dimmed());
    } else {
        let ops: Vec<String> = request.operations.iter().map(|op| op.to_string()).collect();
        println!("  Operations: {}", ops.join(" → "));
    }
    println!(
        "{}",
        "Results are reported to the snapshot API when the run finishes.".dimmed()
    );

    Ok(())
}
