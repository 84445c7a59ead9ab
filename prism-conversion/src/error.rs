//! Processor error type

use prism_core::domain::report::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

use crate::identifier::FileType;
use crate::invoker::ToolError;

/// Result type alias for processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Failure of a single processor operation
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// An external program failed to start or exited nonzero
    #[error(transparent)]
    ToolExecution(ToolError),

    /// Tool output did not have the expected shape
    #[error("could not parse {program} output '{}': {reason}", .output.trim())]
    MeasurementParse {
        program: String,
        output: String,
        reason: String,
    },

    /// The run was cancelled or hit its deadline
    #[error("cancelled")]
    Cancelled,

    /// No processor implements this operation for the file type
    #[error("{operation} is not supported for {file_type} files")]
    Unsupported {
        file_type: FileType,
        operation: String,
    },

    /// Reading or writing a file failed
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(
        program: impl Into<String>,
        output: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MeasurementParse {
            program: program.into(),
            output: output.into(),
            reason: reason.into(),
        }
    }

    /// Classification used in run reports
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessorError::ToolExecution(_) => ErrorKind::ToolExecution,
            ProcessorError::MeasurementParse { .. } => ErrorKind::MeasurementParse,
            ProcessorError::Cancelled => ErrorKind::Cancelled,
            ProcessorError::Unsupported { .. } => ErrorKind::Unsupported,
            ProcessorError::Io { .. } => ErrorKind::Io,
        }
    }
}

impl From<ToolError> for ProcessorError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Cancelled { .. } => ProcessorError::Cancelled,
            other => ProcessorError::ToolExecution(other),
        }
    }
}
