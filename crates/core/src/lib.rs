//! Core domain types, cropping, run configuration and token text
//! normalization for capturing slide presentations as searchable PDFs.

pub mod config;
pub mod error;
pub mod normalize;
pub mod types;

pub use config::{RunConfig, ThresholdMethod};
pub use error::{Error, Result};
pub use normalize::TokenNormalizer;
pub use types::{CropMargins, CroppedFrame, Frame, TextToken};
