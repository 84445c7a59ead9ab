//! Run-owned files
//!
//! Every file a run creates is named `<uuid><extension>` so concurrent runs
//! never collide, and is owned by a guard that deletes it on drop. Drop also
//! fires when a run future is abandoned on cancellation, so cleanup does not
//! depend on the run reaching its own error handling.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Extension of `path` including the leading dot, or an empty string
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Fresh unique path inside `dir`
pub fn unique_path(dir: &Path, extension: &str) -> PathBuf {
    dir.join(format!("{}{}", Uuid::new_v4(), extension))
}

fn remove(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// A scratch file removed when dropped
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Reserves a unique path in `dir`; the file itself is created by whoever writes it
    pub fn new(dir: &Path, extension: &str) -> Self {
        Self {
            path: unique_path(dir, extension),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        remove(&self.path);
    }
}

/// Output files of one run
///
/// Files are deleted on drop unless [`OutputFiles::commit`] was called, so a
/// failed or cancelled run leaves nothing behind.
#[derive(Debug)]
pub struct OutputFiles {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl OutputFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
        }
    }

    /// Reserves and tracks a new output path
    pub fn allocate(&mut self, extension: &str) -> PathBuf {
        let path = unique_path(&self.dir, extension);
        self.files.push(path.clone());
        path
    }

    /// Keeps every allocated file
    pub fn commit(mut self) {
        self.files.clear();
    }
}

impl Drop for OutputFiles {
    fn drop(&mut self) {
        for path in &self.files {
            remove(path);
        }
    }
}
