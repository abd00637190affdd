//! OCR side of slide capture: adaptive-threshold preprocessing and text
//! detection backends.
//!
//! The binary image produced here only feeds detection; it never reaches the
//! output document.

pub mod detector;
pub mod preprocess;

pub use detector::{parse_tsv, TesseractConfig, TesseractDetector, TextDetector};
pub use preprocess::{OcrFrame, Preprocessor};
