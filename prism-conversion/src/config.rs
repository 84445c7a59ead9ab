//! Service configuration
//!
//! Every setting has a default so the service starts with an empty
//! environment; processors and the scheduler receive their slice of it
//! explicitly.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::processor::{ImageLimits, ImageTools};
use crate::scheduler::SchedulerConfig;

/// Conversion service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP endpoint binds to
    pub bind_addr: String,

    /// Snapshot API base URL; reports are only logged when unset
    pub api_url: Option<String>,

    /// Bearer token for the snapshot API
    pub api_key: Option<String>,

    /// Runs executing at the same time
    pub max_parallel_runs: usize,

    /// Maximum time one run may take once it has a slot
    pub run_timeout: Duration,

    /// Where file-producing operations write their results
    pub output_dir: PathBuf,

    /// Scratch directory for intermediate files
    pub temp_dir: PathBuf,

    pub limits: ImageLimits,

    pub tools: ImageTools,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Recognised variables:
    /// - BIND_ADDR (default: 0.0.0.0:8083)
    /// - API_URL, API_KEY (optional)
    /// - MAX_PARALLEL_RUNS (default: 4)
    /// - RUN_TIMEOUT (seconds, default: 300)
    /// - OUTPUT_DIR (default: <tmp>/prism/output)
    /// - TEMP_DIR (default: system temp dir)
    /// - LIMITS_IMAGE_PREVIEW_MAX_WIDTH / LIMITS_IMAGE_PREVIEW_MAX_HEIGHT (default: 512)
    /// - IDENTIFY_PATH / CONVERT_PATH / EXIFTOOL_PATH
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup
    ///
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|s| parse::<u64>(&s));
        let non_blank = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        Self {
            bind_addr: non_blank("BIND_ADDR").unwrap_or(defaults.bind_addr),
            api_url: non_blank("API_URL").map(|s| s.trim_end_matches('/').to_string()),
            api_key: non_blank("API_KEY"),
            max_parallel_runs: lookup("MAX_PARALLEL_RUNS")
                .and_then(|s| parse::<usize>(&s))
                .unwrap_or(defaults.max_parallel_runs),
            run_timeout: parsed("RUN_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.run_timeout),
            output_dir: non_blank("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            temp_dir: non_blank("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            limits: ImageLimits {
                preview_max_width: lookup("LIMITS_IMAGE_PREVIEW_MAX_WIDTH")
                    .and_then(|s| parse::<u32>(&s))
                    .unwrap_or(defaults.limits.preview_max_width),
                preview_max_height: lookup("LIMITS_IMAGE_PREVIEW_MAX_HEIGHT")
                    .and_then(|s| parse::<u32>(&s))
                    .unwrap_or(defaults.limits.preview_max_height),
            },
            tools: ImageTools {
                identify: non_blank("IDENTIFY_PATH").unwrap_or(defaults.tools.identify),
                convert: non_blank("CONVERT_PATH").unwrap_or(defaults.tools.convert),
                exiftool: non_blank("EXIFTOOL_PATH").unwrap_or(defaults.tools.exiftool),
            },
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.trim().is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if let Some(url) = &self.api_url
            && !url.starts_with("http://")
            && !url.starts_with("https://")
        {
            anyhow::bail!("api_url must start with http:// or https://");
        }

        if self.max_parallel_runs == 0 {
            anyhow::bail!("max_parallel_runs must be greater than 0");
        }

        if self.max_parallel_runs > Semaphore::MAX_PERMITS {
            anyhow::bail!(
                "max_parallel_runs must be at most {}",
                Semaphore::MAX_PERMITS
            );
        }

        if self.run_timeout.is_zero() {
            anyhow::bail!("run_timeout must be greater than 0");
        }

        if self.limits.preview_max_width == 0 || self.limits.preview_max_height == 0 {
            anyhow::bail!("image preview limits must be greater than 0");
        }

        Ok(())
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_parallel_runs: self.max_parallel_runs,
            run_timeout: self.run_timeout,
            output_dir: self.output_dir.clone(),
        }
    }
}

fn parse<T: FromStr>(value: &str) -> Option<T> {
    value.trim().parse().ok()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8083".to_string(),
            api_url: None,
            api_key: None,
            max_parallel_runs: 4,
            run_timeout: Duration::from_secs(300), // 5 minutes
            output_dir: std::env::temp_dir().join("prism").join("output"),
            temp_dir: std::env::temp_dir(),
            limits: ImageLimits::default(),
            tools: ImageTools::default(),
        }
    }
}
