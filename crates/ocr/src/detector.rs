//! Text detection backends.
//!
//! A detector turns an [`OcrFrame`] into word tokens with pixel boxes in that
//! frame's coordinate space. Detection is an external capability; the
//! pipeline only depends on the [`TextDetector`] trait.

use std::path::PathBuf;
use std::process::Command;

use image::ImageFormat;
use slidecap_core::{Error, Result, TextToken};

use crate::preprocess::OcrFrame;

/// Text detector trait.
pub trait TextDetector {
    /// Short backend name for logging.
    fn name(&self) -> &str;

    /// Check if the backend can be used on this machine.
    fn is_available(&self) -> bool {
        true
    }

    /// Detect words in a binarized frame.
    ///
    /// Errors must be reported as [`Error::DetectionFailure`]; returning an
    /// empty list stands for "no text on this slide".
    fn detect(&self, frame: &OcrFrame) -> Result<Vec<TextToken>>;
}

/// Configuration for the Tesseract command-line backend.
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Path to the tesseract executable (default: "tesseract" - uses PATH)
    pub executable: PathBuf,
    /// Recognition language(s), e.g. "eng" or "eng+deu"
    pub language: String,
    /// Page segmentation mode passed as --psm (default: 3, fully automatic)
    pub page_segmentation_mode: u8,
    /// Words below this confidence (0-100) are dropped
    pub min_confidence: f32,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            page_segmentation_mode: 3,
            min_confidence: 0.0,
        }
    }
}

/// Detector that shells out to `tesseract ... tsv`.
pub struct TesseractDetector {
    config: TesseractConfig,
}

impl TesseractDetector {
    /// Create a detector, rejecting language codes that could smuggle arguments.
    pub fn new(config: TesseractConfig) -> Result<Self> {
        validate_language(&config.language)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }
}

impl TextDetector for TesseractDetector {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        matches!(
            Command::new(&self.config.executable).arg("--version").output(),
            Ok(output) if output.status.success()
        )
    }

    fn detect(&self, frame: &OcrFrame) -> Result<Vec<TextToken>> {
        let slide = frame.slide();
        let failure = |message: String| Error::DetectionFailure { slide, message };

        // Removed when dropped, on every return path.
        let input = tempfile::Builder::new()
            .prefix("slidecap-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| failure(format!("Failed to create temp file: {}", e)))?;

        frame
            .image()
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| failure(format!("Failed to write OCR image: {}", e)))?;

        let output = Command::new(&self.config.executable)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .arg("--psm")
            .arg(self.config.page_segmentation_mode.to_string())
            .arg("tsv")
            .output()
            .map_err(|e| {
                failure(format!(
                    "Failed to run {}: {}",
                    self.config.executable.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let tokens = parse_tsv(&tsv, self.config.min_confidence);

        log::debug!("tesseract found {} words on slide {}", tokens.len(), slide);

        Ok(tokens)
    }
}

/// Validate language code to prevent argument injection.
fn validate_language(lang: &str) -> Result<()> {
    // Language codes are alphanumeric with optional underscore/plus (e.g., "eng", "eng+deu", "chi_sim")
    if lang.is_empty() || lang.len() > 32 {
        return Err(Error::InvalidConfig(format!(
            "Invalid OCR language code length: {:?}",
            lang
        )));
    }
    if let Some(c) = lang
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '+' && *c != '_')
    {
        return Err(Error::InvalidConfig(format!(
            "Invalid character in OCR language code: {}",
            c
        )));
    }
    Ok(())
}

/// TSV row level for individual words.
const WORD_LEVEL: u32 = 5;

/// Parse tesseract TSV output into word tokens.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num, left,
/// top, width, height, conf, text. Only word rows with non-negative
/// confidence and non-blank text are kept.
pub fn parse_tsv(tsv: &str, min_confidence: f32) -> Vec<TextToken> {
    let mut tokens = Vec::new();

    for (line_no, line) in tsv.lines().enumerate() {
        if line.starts_with("level") || line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 {
            log::warn!("Skipping short TSV row {}: {:?}", line_no + 1, line);
            continue;
        }

        let level: u32 = match fields[0].trim().parse() {
            Ok(level) => level,
            Err(_) => {
                log::warn!("Skipping TSV row {} with bad level", line_no + 1);
                continue;
            }
        };
        if level != WORD_LEVEL {
            continue;
        }

        let number = |i: usize| fields[i].trim().parse::<i64>().ok();
        let (Some(left), Some(top), Some(width), Some(height)) =
            (number(6), number(7), number(8), number(9))
        else {
            log::warn!("Skipping TSV row {} with bad box", line_no + 1);
            continue;
        };

        let confidence: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        if confidence < 0.0 || confidence < min_confidence {
            continue;
        }

        let text = fields.get(11).copied().unwrap_or("");
        if text.trim().is_empty() {
            continue;
        }

        tokens.push(TextToken::new(
            text,
            clamp_pixel(left),
            clamp_pixel(top),
            clamp_pixel(width),
            clamp_pixel(height),
        ));
    }

    tokens
}

fn clamp_pixel(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

/// Mock detector for testing
#[cfg(test)]
pub struct MockDetector {
    pub tokens: Vec<TextToken>,
}

#[cfg(test)]
impl TextDetector for MockDetector {
    fn name(&self) -> &str {
        "mock"
    }

    fn detect(&self, _frame: &OcrFrame) -> Result<Vec<TextToken>> {
        Ok(self.tokens.clone())
    }
}
