//! Execution of a single pipeline run
//!
//! Operations run strictly in order. A file-producing operation writes a
//! new file into the output directory, and that file becomes the input of
//! every later operation. The first failure aborts the run; files written by
//! a failed or cancelled run are deleted when the run's [`OutputFiles`] is
//! dropped.

use prism_core::domain::report::{Artifact, ErrorKind, RunFailure, RunStatus};
use prism_core::dto::pipeline::{Operation, PipelineRunRequest};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ProcessorError;
use crate::files::{OutputFiles, extension_of};
use crate::processor::Processor;
use crate::registry::ProcessorRegistry;

/// Why a run stopped early
#[derive(Debug)]
pub struct StepFailure {
    /// Failing operation, or `None` if the run failed before dispatch
    pub operation: Option<&'static str>,
    pub error: ProcessorError,
}

impl StepFailure {
    fn dispatch(error: ProcessorError) -> Self {
        Self {
            operation: None,
            error,
        }
    }

    fn at(operation: &Operation, error: ProcessorError) -> Self {
        Self {
            operation: Some(operation.name()),
            error,
        }
    }

    pub fn into_failure(self) -> RunFailure {
        RunFailure {
            kind: self.error.kind(),
            operation: self.operation.map(str::to_string),
            message: self.error.to_string(),
        }
    }
}

/// Failure reported when a run exceeds its deadline inside `operation`
pub fn deadline_failure(timeout: std::time::Duration, operation: Option<&str>) -> RunFailure {
    RunFailure {
        kind: ErrorKind::Cancelled,
        operation: operation.map(str::to_string),
        message: format!("run exceeded its deadline of {:?}", timeout),
    }
}

/// Runs every operation of `request` and returns the produced artifacts
pub async fn execute(
    request: &PipelineRunRequest,
    registry: &ProcessorRegistry,
    output_dir: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<Artifact>, StepFailure> {
    let source = PathBuf::from(&request.source);

    tokio::fs::metadata(&source)
        .await
        .map_err(|e| StepFailure::dispatch(ProcessorError::io(&source, e)))?;
    let processor = registry.resolve(&source).map_err(StepFailure::dispatch)?;

    let operations = if request.operations.is_empty() {
        processor.default_operations()
    } else {
        request.operations.clone()
    };

    info!(
        "Pipeline run {} {}: {} operation(s) on {} ({})",
        request.snapshot_id,
        RunStatus::Dispatched,
        operations.len(),
        source.display(),
        processor.file_type()
    );

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| StepFailure::dispatch(ProcessorError::io(output_dir, e)))?;

    let mut outputs = OutputFiles::new(output_dir);
    let mut current = source;
    let mut artifacts = Vec::with_capacity(operations.len());

    for operation in &operations {
        if cancel.is_cancelled() {
            return Err(StepFailure::at(operation, ProcessorError::Cancelled));
        }

        debug!(
            "Pipeline run {}: {} on {}",
            request.snapshot_id,
            operation,
            current.display()
        );

        let (artifact, next) = run_operation(
            processor.as_ref(),
            operation,
            &current,
            &mut outputs,
            cancel,
        )
        .await
        .map_err(|e| StepFailure::at(operation, e))?;

        artifacts.push(artifact);
        if let Some(next) = next {
            current = next;
        }
    }

    outputs.commit();
    Ok(artifacts)
}

/// Runs one operation; file-producing operations also return the new file
async fn run_operation(
    processor: &dyn Processor,
    operation: &Operation,
    input: &Path,
    outputs: &mut OutputFiles,
    cancel: &CancellationToken,
) -> Result<(Artifact, Option<PathBuf>), ProcessorError> {
    if operation.produces_file() {
        let output = outputs.allocate(&operation.output_extension(&extension_of(input)));
        write_file(processor, operation, input, &output, cancel).await?;
        let artifact = Artifact::File {
            operation: operation.name().to_string(),
            path: output.to_string_lossy().to_string(),
        };
        return Ok((artifact, Some(output)));
    }

    let artifact = match operation {
        Operation::Measure => Artifact::Dimensions(processor.measure(input, cancel).await?),
        Operation::ExtractDpi => Artifact::Dpi {
            value: processor.extract_dpi(input, cancel).await?,
        },
        Operation::Base64Thumbnail => {
            Artifact::Thumbnail(processor.base64_thumbnail(input, cancel).await?)
        }
        other => return Err(processor.unsupported(other.name())),
    };
    Ok((artifact, None))
}

async fn write_file(
    processor: &dyn Processor,
    operation: &Operation,
    input: &Path,
    output: &Path,
    cancel: &CancellationToken,
) -> Result<(), ProcessorError> {
    match operation {
        Operation::Resize(spec) => processor.resize(input, *spec, output, cancel).await,
        Operation::Thumbnail(spec) => processor.thumbnail(input, *spec, output, cancel).await,
        Operation::Convert { .. } => processor.convert(input, output, cancel).await,
        Operation::RemoveAlphaChannel => {
            processor.remove_alpha_channel(input, output, cancel).await
        }
        other => Err(processor.unsupported(other.name())),
    }
}
