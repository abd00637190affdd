//! Per-run configuration passed explicitly into the pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::CropMargins;

/// How the local threshold of a neighbourhood is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMethod {
    /// Unweighted mean of the window.
    #[default]
    Mean,
    /// Gaussian-weighted mean of the window.
    Gaussian,
}

/// Settings for one capture run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Pixel rows removed from the top of every frame.
    pub top_crop_margin: u32,

    /// Pixel rows removed from the bottom of every frame.
    pub bottom_crop_margin: u32,

    /// Side of the square neighbourhood used for adaptive thresholding. Odd, >= 3.
    pub threshold_window_size: u32,

    /// Constant subtracted from the local mean before comparison.
    pub threshold_bias: i32,

    /// Local mean weighting.
    pub threshold_method: ThresholdMethod,

    /// Invisible text font size as a multiple of the token box height.
    pub font_size_ratio: f32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            top_crop_margin: 80,
            bottom_crop_margin: 80,
            threshold_window_size: 11,
            threshold_bias: 2,
            threshold_method: ThresholdMethod::Mean,
            font_size_ratio: 1.0,
        }
    }
}

impl RunConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the top and bottom crop margins.
    pub fn with_crop_margins(mut self, top: u32, bottom: u32) -> Self {
        self.top_crop_margin = top;
        self.bottom_crop_margin = bottom;
        self
    }

    /// Set the adaptive threshold window and bias.
    pub fn with_threshold(mut self, window_size: u32, bias: i32) -> Self {
        self.threshold_window_size = window_size;
        self.threshold_bias = bias;
        self
    }

    pub fn crop_margins(&self) -> CropMargins {
        CropMargins::new(self.top_crop_margin, self.bottom_crop_margin)
    }

    /// Check value ranges before a run starts.
    pub fn validate(&self) -> Result<()> {
        if self.threshold_window_size < 3 || self.threshold_window_size % 2 == 0 {
            return Err(Error::InvalidConfig(format!(
                "threshold window size must be odd and at least 3, got {}",
                self.threshold_window_size
            )));
        }

        if !self.font_size_ratio.is_finite() || self.font_size_ratio <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "font size ratio must be a positive number, got {}",
                self.font_size_ratio
            )));
        }

        Ok(())
    }
}
