//! Binarization of cropped frames for text detection.
//!
//! Slides are often rendered over smooth gradients, so a single global cutoff
//! loses text on one side of the slide or the other. Each pixel is instead
//! compared against the mean of its own neighbourhood, with inverted polarity:
//! pixels darker than their surroundings by more than the bias become 255.

use image::{GrayImage, Luma};
use imageproc::filter::{box_filter, gaussian_blur_f32};
use slidecap_core::{CroppedFrame, RunConfig, ThresholdMethod};

/// Value of "on" (text) pixels in the binary image.
pub const FOREGROUND: u8 = 255;

/// Value of background pixels in the binary image.
pub const BACKGROUND: u8 = 0;

/// Two-tone image fed to the text detector. Never rendered.
#[derive(Debug, Clone)]
pub struct OcrFrame {
    slide: usize,
    image: GrayImage,
}

impl OcrFrame {
    pub fn new(slide: usize, image: GrayImage) -> Self {
        Self { slide, image }
    }

    pub fn slide(&self) -> usize {
        self.slide
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }
}

/// Adaptive-threshold preprocessor.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    window_size: u32,
    bias: i32,
    method: ThresholdMethod,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::from_config(&RunConfig::default())
    }
}

impl Preprocessor {
    /// Create a mean-threshold preprocessor with the given window and bias.
    ///
    /// `window_size` is the side of the square neighbourhood; even values are
    /// rounded up to the next odd size.
    pub fn new(window_size: u32, bias: i32) -> Self {
        Self {
            window_size: window_size.max(3) | 1,
            bias,
            method: ThresholdMethod::Mean,
        }
    }

    /// Build from the run configuration.
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.threshold_window_size, config.threshold_bias)
            .with_method(config.threshold_method)
    }

    /// Set how the neighbourhood mean is weighted.
    pub fn with_method(mut self, method: ThresholdMethod) -> Self {
        self.method = method;
        self
    }

    /// Produce the binary OCR image for a cropped frame.
    ///
    /// The output always has the same width and height as the input, so
    /// detector boxes apply to the cropped frame without rescaling.
    pub fn preprocess(&self, frame: &CroppedFrame) -> OcrFrame {
        let gray = image::imageops::grayscale(frame.image());
        let binary = self.threshold(&gray);

        log::debug!(
            "Binarized slide {} ({}x{}, window {}, bias {}, {:?})",
            frame.slide(),
            binary.width(),
            binary.height(),
            self.window_size,
            self.bias,
            self.method
        );

        OcrFrame::new(frame.slide(), binary)
    }

    /// Inverted adaptive threshold of a single-channel image.
    pub fn threshold(&self, gray: &GrayImage) -> GrayImage {
        let local = self.local_mean(gray);
        let bias = self.bias;

        GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            let value = i32::from(gray.get_pixel(x, y)[0]);
            let mean = i32::from(local.get_pixel(x, y)[0]);
            if value <= mean - bias {
                Luma([FOREGROUND])
            } else {
                Luma([BACKGROUND])
            }
        })
    }

    fn local_mean(&self, gray: &GrayImage) -> GrayImage {
        let radius = self.window_size / 2;
        match self.method {
            ThresholdMethod::Mean => box_filter(gray, radius, radius),
            ThresholdMethod::Gaussian => gaussian_blur_f32(gray, gaussian_sigma(self.window_size)),
        }
    }
}

/// Standard deviation matching a Gaussian kernel of the given odd size.
fn gaussian_sigma(window_size: u32) -> f32 {
    0.3 * ((window_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}
