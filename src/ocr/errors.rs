//! Errors reported for individual input files.

use thiserror::Error;

use crate::prelude::*;

/// Why a single file could not be turned into text.
///
/// None of these abort a batch. Each one is reported next to the file it
/// belongs to, and processing moves on.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The file's extension isn't one we know how to read.
    #[error("Unsupported file type: {0}")]
    UnsupportedFileKind(String),

    /// The reference resolved to a path with no file behind it.
    #[error("File not found: {}", display_name(.0))]
    FileNotFound(PathBuf),

    /// The recognition engine failed to start or to process a page.
    #[error("{0:#}")]
    EngineFailure(anyhow::Error),

    /// A page could not be rendered or decoded.
    #[error("{0:#}")]
    RenderFailure(anyhow::Error),
}

/// The name we show users for a file: its final path component.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
