//! Run report types
//!
//! A report is sent to the result-reporting API once per run, after the
//! run reaches a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::domain::image::{EncodedThumbnail, ImageDimensions};

/// Lifecycle of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Received,
    Dispatched,
    Completed,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Received => "received",
            RunStatus::Dispatched => "dispatched",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Something a run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    Dimensions(ImageDimensions),
    Thumbnail(EncodedThumbnail),
    Dpi { value: u32 },
    File { operation: String, path: String },
}

/// Classification of a run failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    ToolExecution,
    MeasurementParse,
    Cancelled,
    Unsupported,
    Io,
}

/// Why a run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: ErrorKind,
    /// Operation that failed, if the failure happened inside one
    pub operation: Option<String>,
    pub message: String,
}

/// Terminal outcome of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub snapshot_id: String,
    pub pipeline_id: Option<String>,
    pub status: RunStatus,
    pub artifacts: Vec<Artifact>,
    pub error: Option<RunFailure>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Request payload, echoed back unchanged
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub payload: HashMap<String, String>,
}

impl PipelineReport {
    /// Report for a run whose every operation succeeded
    pub fn completed(
        snapshot_id: String,
        pipeline_id: Option<String>,
        artifacts: Vec<Artifact>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            snapshot_id,
            pipeline_id,
            status: RunStatus::Completed,
            artifacts,
            error: None,
            started_at,
            completed_at: Utc::now(),
            payload: HashMap::new(),
        }
    }

    /// Report for a failed run
    ///
    /// Carries no artifacts: nothing from a failed run is surfaced.
    pub fn failed(
        snapshot_id: String,
        pipeline_id: Option<String>,
        failure: RunFailure,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            snapshot_id,
            pipeline_id,
            status: RunStatus::Failed,
            artifacts: Vec::new(),
            error: Some(failure),
            started_at,
            completed_at: Utc::now(),
            payload: HashMap::new(),
        }
    }

    pub fn with_payload(mut self, payload: HashMap<String, String>) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
