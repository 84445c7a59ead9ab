//! File-type identification
//!
//! Maps a source path to the file-type family whose processor handles it.
//! Identification is by extension, case-insensitively.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// File-type family handled by one processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Image,
    Pdf,
    Office,
    Video,
    Other,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileType::Image => "image",
            FileType::Pdf => "pdf",
            FileType::Office => "office",
            FileType::Video => "video",
            FileType::Other => "other",
        };
        f.write_str(s)
    }
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "xpm", "png", "jpg", "jpeg", "jp2", "gif", "webp", "tiff", "tif", "bmp", "ico", "heif",
    "heic", "avif", "xcf", "svg",
];

const OFFICE_EXTENSIONS: &[&str] = &[
    "csv", "doc", "docx", "dotx", "dot", "odt", "ott", "ods", "ots", "odp", "otp", "odg", "otg",
    "pages", "numbers", "key", "ppt", "pptx", "potx", "pot", "rtf", "xls", "xlsx", "xltx", "xlt",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    "ogv", "mpeg", "mpg", "mov", "mqv", "mp4", "webm", "3gp", "3g2", "avi", "flv", "mkv", "asf",
    "m4v",
];

/// Identifies the file type of a source path
#[derive(Debug, Clone, Copy, Default)]
pub struct FileIdentifier;

impl FileIdentifier {
    pub fn new() -> Self {
        Self
    }

    pub fn identify(&self, path: &Path) -> FileType {
        let Some(ext) = path.extension() else {
            return FileType::Other;
        };
        let ext = ext.to_string_lossy().to_lowercase();

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            FileType::Image
        } else if ext == "pdf" {
            FileType::Pdf
        } else if OFFICE_EXTENSIONS.contains(&ext.as_str()) {
            FileType::Office
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            FileType::Video
        } else {
            FileType::Other
        }
    }
}
