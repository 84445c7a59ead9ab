//! Prism CLI
//!
//! Command-line interface for submitting pipeline runs to the conversion
//! service.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "prism")]
#[command(about = "Prism file conversion CLI", long_about = None)]
struct Cli {
    /// Conversion service URL
    #[arg(long, env = "PRISM_CONVERSION_URL", default_value = "http://localhost:8083")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        conversion_url: cli.url,
    };

    handle_command(cli.command, &config).await
}
