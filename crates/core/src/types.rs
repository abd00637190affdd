//! Domain types for captured slide frames and detected text.

use std::path::Path;

use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A raw captured screenshot of one slide.
///
/// Pixel origin is top-left, colour data is RGB.
#[derive(Debug, Clone)]
pub struct Frame {
    slide: usize,
    image: RgbImage,
}

impl Frame {
    /// Wrap an RGB raster captured for `slide`.
    pub fn new(slide: usize, image: RgbImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::DecodeFailure {
                slide,
                message: format!("empty image ({}x{})", image.width(), image.height()),
            });
        }
        Ok(Self { slide, image })
    }

    /// Convert any decoded image to an RGB frame, dropping alpha.
    pub fn from_dynamic(slide: usize, image: DynamicImage) -> Result<Self> {
        Self::new(slide, image.to_rgb8())
    }

    /// Decode an encoded raster (PNG, JPEG) from memory.
    pub fn decode(slide: usize, bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).map_err(|e| Error::DecodeFailure {
            slide,
            message: e.to_string(),
        })?;
        Self::from_dynamic(slide, image)
    }

    /// Decode a raster file from disk.
    pub fn open(slide: usize, path: &Path) -> Result<Self> {
        let image = image::open(path).map_err(|e| Error::DecodeFailure {
            slide,
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_dynamic(slide, image)
    }

    /// 0-based slide index in capture order.
    pub fn slide(&self) -> usize {
        self.slide
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Remove the configured bands from the top and bottom of the frame.
    ///
    /// Fails if the margins consume the whole height.
    pub fn crop(&self, margins: CropMargins) -> Result<CroppedFrame> {
        let height = self.height();
        let removed = u64::from(margins.top) + u64::from(margins.bottom);
        if removed >= u64::from(height) {
            return Err(Error::InvalidCrop {
                top: margins.top,
                bottom: margins.bottom,
                height,
            });
        }

        let kept = height - margins.top - margins.bottom;
        let image = image::imageops::crop_imm(&self.image, 0, margins.top, self.width(), kept).to_image();

        log::debug!(
            "Cropped slide {} from {}x{} to {}x{}",
            self.slide,
            self.width(),
            height,
            image.width(),
            image.height()
        );

        Ok(CroppedFrame {
            slide: self.slide,
            image,
        })
    }
}

/// A frame with its top and bottom margins removed.
///
/// This is both the background of the finished page and the source of the
/// OCR image, so detected boxes line up with it pixel for pixel.
#[derive(Debug, Clone)]
pub struct CroppedFrame {
    slide: usize,
    image: RgbImage,
}

impl CroppedFrame {
    /// Use an already-cropped raster directly.
    pub fn new(slide: usize, image: RgbImage) -> Self {
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

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

/// Pixel bands removed from the top and bottom of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CropMargins {
    pub top: u32,
    pub bottom: u32,
}

impl CropMargins {
    pub fn new(top: u32, bottom: u32) -> Self {
        Self { top, bottom }
    }
}

/// One recognized word or phrase with its bounding box.
///
/// Box coordinates are in pixels of the image the detector saw, origin
/// top-left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextToken {
    pub text: String,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl TextToken {
    pub fn new(text: impl Into<String>, left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            text: text.into(),
            left,
            top,
            width,
            height,
        }
    }

    /// True if the text is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Whether the box extends past a `width` x `height` image.
    pub fn exceeds(&self, width: u32, height: u32) -> bool {
        u64::from(self.left) + u64::from(self.width) > u64::from(width)
            || u64::from(self.top) + u64::from(self.height) > u64::from(height)
    }
}
