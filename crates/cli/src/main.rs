//! CLI tool for capturing a slide presentation into a searchable PDF.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use slidecap_core::{Error, RunConfig, ThresholdMethod};
use slidecap_ocr::{TesseractConfig, TesseractDetector, TextDetector};
use slidecap_pdf::Document;
use slidecap_pipeline::{CommandSource, DirectorySource, Pipeline, SlideSource};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Capture slides into a PDF with an invisible, searchable OCR text layer.
#[derive(Parser, Debug)]
#[command(name = "slidecap")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["frames", "capture_cmd"])))]
struct Args {
    /// Output PDF file
    #[arg(short, long, default_value = "presentation.pdf")]
    output: PathBuf,

    /// Directory of already captured screenshots (ordered by number in filename)
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Screenshot command run once per slide; {output} is replaced with the PNG path
    #[arg(long, requires = "slides")]
    capture_cmd: Option<String>,

    /// Command that advances the presentation to the next slide
    #[arg(long, requires = "capture_cmd")]
    next_cmd: Option<String>,

    /// Number of slides to capture
    #[arg(short = 'n', long)]
    slides: Option<usize>,

    /// Wait after each advance, in milliseconds
    #[arg(long, default_value = "4000")]
    settle_ms: u64,

    /// Wait before the first capture, in milliseconds
    #[arg(long, default_value = "15000")]
    initial_wait_ms: u64,

    /// JSON run configuration (crop margins, threshold, font ratio)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pixel rows removed from the top of each screenshot
    #[arg(long)]
    top_crop: Option<u32>,

    /// Pixel rows removed from the bottom of each screenshot
    #[arg(long)]
    bottom_crop: Option<u32>,

    /// Adaptive threshold window size (odd)
    #[arg(long)]
    window: Option<u32>,

    /// Adaptive threshold bias
    #[arg(long, allow_hyphen_values = true)]
    bias: Option<i32>,

    /// Use a Gaussian-weighted neighbourhood instead of a plain mean
    #[arg(long)]
    gaussian: bool,

    /// Invisible text font size as a multiple of the word box height
    #[arg(long)]
    font_ratio: Option<f32>,

    /// Path to the tesseract executable
    #[arg(long, default_value = "tesseract")]
    tesseract: PathBuf,

    /// OCR language(s), e.g. "eng" or "eng+deu"
    #[arg(short, long, default_value = "eng")]
    lang: String,

    /// Tesseract page segmentation mode
    #[arg(long, default_value = "3")]
    psm: u8,

    /// Drop words recognized below this confidence (0-100)
    #[arg(long, default_value = "0")]
    min_confidence: f32,

    /// Title stored in the PDF metadata
    #[arg(short, long)]
    title: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let config = load_config(&args)?;
    log::debug!("Run configuration: {:?}", config);

    let detector = TesseractDetector::new(TesseractConfig {
        executable: args.tesseract.clone(),
        language: args.lang.clone(),
        page_segmentation_mode: args.psm,
        min_confidence: args.min_confidence,
    })?;
    if !detector.is_available() {
        anyhow::bail!(
            "tesseract not found at {} (install it or pass --tesseract)",
            args.tesseract.display()
        );
    }

    let mut pipeline = Pipeline::new(config, Box::new(detector))?;
    if let Some(title) = &args.title {
        pipeline = pipeline.with_title(title);
    }

    // Dropping the source removes any temporary screenshots, on success or failure.
    let mut source = open_source(&args)?;

    let document = pipeline
        .collect(source.as_mut())
        .context("Capture aborted, no document written")?;

    let written = write_document(&document, &args.output, &std::env::temp_dir())?;

    println!(
        "Saved {} pages ({} searchable words) to {}",
        document.len(),
        document.text_draw_count(),
        written.display()
    );

    Ok(())
}

/// Load the JSON configuration, if any, then apply flag overrides.
fn load_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => RunConfig::default(),
    };

    if let Some(top) = args.top_crop {
        config.top_crop_margin = top;
    }
    if let Some(bottom) = args.bottom_crop {
        config.bottom_crop_margin = bottom;
    }
    if let Some(window) = args.window {
        config.threshold_window_size = window;
    }
    if let Some(bias) = args.bias {
        config.threshold_bias = bias;
    }
    if args.gaussian {
        config.threshold_method = ThresholdMethod::Gaussian;
    }
    if let Some(ratio) = args.font_ratio {
        config.font_size_ratio = ratio;
    }

    config.validate()?;
    Ok(config)
}

/// Build the slide source selected on the command line.
fn open_source(args: &Args) -> Result<Box<dyn SlideSource>> {
    if let Some(dir) = &args.frames {
        let mut source = DirectorySource::open(dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?;
        if let Some(count) = args.slides {
            source = source.with_slide_count(count);
        }
        log::info!("Using {} screenshots from {}", source.slide_count(), dir.display());
        return Ok(Box::new(source));
    }

    let capture_cmd = args
        .capture_cmd
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Either --frames or --capture-cmd is required"))?;
    let slides = args
        .slides
        .ok_or_else(|| anyhow::anyhow!("--slides is required with --capture-cmd"))?;

    let mut source = CommandSource::new(capture_cmd, slides)?
        .with_settle_delay(Duration::from_millis(args.settle_ms))
        .with_initial_delay(Duration::from_millis(args.initial_wait_ms));
    if let Some(next_cmd) = &args.next_cmd {
        source = source.with_advance_command(next_cmd)?;
    }

    Ok(Box::new(source))
}

/// Write the document, falling back to `fallback_dir` if the target cannot be written.
///
/// The pages are already in memory, so a failed write never means capturing
/// the presentation again. Only write failures are retried; a document that
/// cannot be serialized fails the same way anywhere.
fn write_document(document: &Document, output: &Path, fallback_dir: &Path) -> Result<PathBuf> {
    match document.write(output) {
        Ok(()) => Ok(output.to_path_buf()),
        Err(e @ Error::WriteFailure { .. }) => {
            log::error!("{}", e);

            let fallback = fallback_path(output, fallback_dir);
            log::warn!("Retrying write to {}", fallback.display());
            document
                .write(&fallback)
                .with_context(|| format!("Failed to write {} and fallback", output.display()))?;
            Ok(fallback)
        }
        Err(e) => Err(e.into()),
    }
}

/// First name in `dir` derived from `output` that does not exist yet.
fn fallback_path(output: &Path, dir: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "presentation".to_string());

    let candidate = dir.join(format!("{}.pdf", stem));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{}-{}.pdf", stem, n)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
