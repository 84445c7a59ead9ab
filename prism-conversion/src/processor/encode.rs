//! File contents → base64

use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::path::Path;
use tracing::debug;

use crate::error::{ProcessorError, Result};

/// Reads `path` and returns its bytes as standard base64
pub async fn file_to_base64(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ProcessorError::io(path, e))?;

    let b64 = STANDARD.encode(&bytes);
    debug!(
        "Encoded {} ({} bytes) → {} bytes base64",
        path.display(),
        bytes.len(),
        b64.len()
    );

    Ok(b64)
}
