//! Media processors
//!
//! A processor implements the operation set for one file-type family on top
//! of a [`crate::invoker::ToolInvoker`]. Every operation has a default that
//! reports it as unsupported, so a processor for a new family only
//! implements the operations that make sense for it.

mod encode;
mod image;

pub use image::{ImageLimits, ImageProcessor, ImageTools};

use async_trait::async_trait;
use prism_core::domain::image::{EncodedThumbnail, ImageDimensions, ResizeSpec};
use prism_core::dto::pipeline::Operation;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::error::{ProcessorError, Result};
use crate::identifier::FileType;

/// Operation set for one file-type family
#[async_trait]
pub trait Processor: Send + Sync {
    /// File type this processor is registered under
    fn file_type(&self) -> FileType;

    /// Operations run when a request names none
    fn default_operations(&self) -> Vec<Operation>;

    /// Measures pixel geometry
    async fn measure(&self, _input: &Path, _cancel: &CancellationToken) -> Result<ImageDimensions> {
        Err(self.unsupported("measure"))
    }

    /// Writes a resized copy of `input` to `output`
    async fn resize(
        &self,
        _input: &Path,
        _spec: ResizeSpec,
        _output: &Path,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(self.unsupported("resize"))
    }

    /// Writes a flat, single-frame thumbnail of `input` to `output`
    async fn thumbnail(
        &self,
        _input: &Path,
        _spec: ResizeSpec,
        _output: &Path,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(self.unsupported("thumbnail"))
    }

    /// Produces a bounded-size base64 preview
    async fn base64_thumbnail(
        &self,
        _input: &Path,
        _cancel: &CancellationToken,
    ) -> Result<EncodedThumbnail> {
        Err(self.unsupported("base64_thumbnail"))
    }

    /// Transcodes `input` into the format implied by `output`'s extension
    async fn convert(
        &self,
        _input: &Path,
        _output: &Path,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(self.unsupported("convert"))
    }

    /// Writes a copy of `input` without transparency
    async fn remove_alpha_channel(
        &self,
        _input: &Path,
        _output: &Path,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(self.unsupported("remove_alpha_channel"))
    }

    /// Reads the resolution metadata
    async fn extract_dpi(&self, _input: &Path, _cancel: &CancellationToken) -> Result<u32> {
        Err(self.unsupported("extract_dpi"))
    }

    #[doc(hidden)]
    fn unsupported(&self, operation: &str) -> ProcessorError {
        ProcessorError::Unsupported {
            file_type: self.file_type(),
            operation: operation.to_string(),
        }
    }
}
