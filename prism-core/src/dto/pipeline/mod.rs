//! Pipeline DTOs for inter-service communication

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::image::ResizeSpec;
use crate::error::{FieldError, ValidationError};

/// Request to run a pipeline against one source file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineRunRequest {
    /// Opaque identifier of the pipeline definition, if any
    #[serde(default)]
    pub pipeline_id: Option<String>,

    /// Snapshot the results are reported against; identifies the run
    #[serde(default)]
    pub snapshot_id: String,

    /// Path of the source file
    #[serde(default)]
    pub source: String,

    /// Operations to run in order. Empty runs the processor's default pipeline.
    #[serde(default)]
    pub operations: Vec<Operation>,

    /// Free-form parameters, echoed back in the run's report
    #[serde(default)]
    pub payload: HashMap<String, String>,
}

impl PipelineRunRequest {
    pub fn new(snapshot_id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// Appends an operation
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Checks the request shape
    ///
    /// Collects every problem instead of stopping at the first.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut fields = Vec::new();

        if self.snapshot_id.trim().is_empty() {
            fields.push(FieldError {
                field: "snapshot_id".to_string(),
                message: "is required".to_string(),
            });
        }

        if self.source.trim().is_empty() {
            fields.push(FieldError {
                field: "source".to_string(),
                message: "is required".to_string(),
            });
        }

        if let Some(pipeline_id) = &self.pipeline_id {
            if pipeline_id.trim().is_empty() {
                fields.push(FieldError {
                    field: "pipeline_id".to_string(),
                    message: "must not be blank when present".to_string(),
                });
            }
        }

        for (index, operation) in self.operations.iter().enumerate() {
            if let Err(message) = operation.validate() {
                fields.push(FieldError {
                    field: format!("operations[{}]", index),
                    message,
                });
            }
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { fields })
        }
    }
}

/// A single pipeline step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Measure,
    Resize(ResizeSpec),
    Thumbnail(ResizeSpec),
    Base64Thumbnail,
    Convert { extension: String },
    RemoveAlphaChannel,
    ExtractDpi,
}

impl Operation {
    /// Stable name used in logs and failure reports
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Measure => "measure",
            Operation::Resize(_) => "resize",
            Operation::Thumbnail(_) => "thumbnail",
            Operation::Base64Thumbnail => "base64_thumbnail",
            Operation::Convert { .. } => "convert",
            Operation::RemoveAlphaChannel => "remove_alpha_channel",
            Operation::ExtractDpi => "extract_dpi",
        }
    }

    /// Operations that write a new file
    pub fn produces_file(&self) -> bool {
        matches!(
            self,
            Operation::Resize(_)
                | Operation::Thumbnail(_)
                | Operation::Convert { .. }
                | Operation::RemoveAlphaChannel
        )
    }

    /// Extension (with leading dot) of the file this operation writes
    ///
    /// Everything except `convert` keeps the input's extension.
    pub fn output_extension(&self, input_extension: &str) -> String {
        match self {
            Operation::Convert { extension } => {
                format!(".{}", extension.trim_start_matches('.').to_lowercase())
            }
            _ => input_extension.to_string(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Operation::Resize(spec) | Operation::Thumbnail(spec) if spec.is_empty() => {
                Err("needs a nonzero width or height".to_string())
            }
            Operation::Convert { extension } => {
                let ext = extension.trim_start_matches('.');
                if ext.is_empty() {
                    Err("needs a target extension".to_string())
                } else if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                    Err(format!("has an invalid extension '{}'", extension))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Resize(spec) => write!(f, "resize:{}", spec.geometry()),
            Operation::Thumbnail(spec) => write!(f, "thumbnail:{}", spec.geometry()),
            Operation::Convert { extension } => write!(f, "convert:{}", extension),
            other => f.write_str(other.name()),
        }
    }
}

/// Parses the compact command-line form
///
/// `measure`, `dpi`, `base64-thumbnail`, `remove-alpha`, `convert:<ext>`,
/// `resize:<w>x<h>`, `thumbnail:<w>x<h>`. Underscores and dashes are
/// interchangeable.
impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        let name = name.trim().to_lowercase().replace('-', "_");

        let geometry = |arg: Option<&str>| -> Result<ResizeSpec, String> {
            let arg = arg.ok_or_else(|| format!("'{}' needs a <width>x<height> argument", name))?;
            ResizeSpec::parse_geometry(arg).ok_or_else(|| format!("invalid geometry '{}'", arg))
        };

        match name.as_str() {
            "measure" => Ok(Operation::Measure),
            "dpi" | "extract_dpi" => Ok(Operation::ExtractDpi),
            "base64_thumbnail" | "base64" => Ok(Operation::Base64Thumbnail),
            "remove_alpha" | "remove_alpha_channel" => Ok(Operation::RemoveAlphaChannel),
            "resize" => Ok(Operation::Resize(geometry(arg)?)),
            "thumbnail" => Ok(Operation::Thumbnail(geometry(arg)?)),
            "convert" => match arg {
                Some(ext) if !ext.trim().is_empty() => Ok(Operation::Convert {
                    extension: ext.trim().to_string(),
                }),
                _ => Err("'convert' needs a target extension, e.g. convert:jpg".to_string()),
            },
            _ => Err(format!("unknown operation '{}'", s)),
        }
    }
}
