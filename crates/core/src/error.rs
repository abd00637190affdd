//! Error types for slide capture and searchable PDF assembly.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing slides and assembling the document.
///
/// Every variant is fatal for a run: the pipeline stops at the first one and
/// never emits a partial document.
#[derive(Error, Debug)]
pub enum Error {
    /// No frame could be obtained for an expected slide.
    #[error("Capture failed for slide {slide}: {message}")]
    CaptureFailure { slide: usize, message: String },

    /// A frame could not be interpreted as valid image data.
    #[error("Failed to decode frame for slide {slide}: {message}")]
    DecodeFailure { slide: usize, message: String },

    /// The external text detector reported an error.
    #[error("Text detection failed for slide {slide}: {message}")]
    DetectionFailure { slide: usize, message: String },

    /// The output document could not be written.
    #[error("Failed to write {}: {message}", path.display())]
    WriteFailure { path: PathBuf, message: String },

    /// Crop margins leave no pixel rows of the frame.
    #[error("Crop margins {top}+{bottom} leave nothing of a {height}px tall frame")]
    InvalidCrop { top: u32, bottom: u32, height: u32 },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// PDF object construction or serialization error.
    #[error("PDF error: {0}")]
    PdfError(String),

    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Slide index the error is attached to, if any.
    pub fn slide(&self) -> Option<usize> {
        match self {
            Self::CaptureFailure { slide, .. }
            | Self::DecodeFailure { slide, .. }
            | Self::DetectionFailure { slide, .. } => Some(*slide),
            _ => None,
        }
    }
}
