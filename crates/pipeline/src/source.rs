//! Slide sources: where frames come from.
//!
//! Browser automation lives outside this workspace. A source only has to hand
//! over one frame per slide index, in order, and move to the next slide when
//! asked.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use regex::Regex;
use slidecap_core::{Error, Frame, Result};
use tempfile::TempDir;

/// Regex to find the last run of digits in a file stem.
static TRAILING_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\D*$").unwrap());

/// Raster extensions picked up from a screenshot directory.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Placeholder replaced with the screenshot path in capture commands.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// A producer of slide frames in navigation order.
pub trait SlideSource {
    /// Number of slides this source is expected to deliver.
    fn slide_count(&self) -> usize;

    /// Capture the slide currently shown, which is slide `index`.
    fn capture(&mut self, index: usize) -> Result<Frame>;

    /// Move to the next slide and wait for it to settle.
    fn advance(&mut self) -> Result<()>;
}

/// Screenshots already on disk, one file per slide.
///
/// Files are ordered by the last number in their name (`slide_2.png` before
/// `slide_10.png`), then by name.
#[derive(Debug)]
pub struct DirectorySource {
    files: Vec<PathBuf>,
    expected: usize,
}

impl DirectorySource {
    /// Scan a directory for slide images.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                files.push(path);
            }
        }

        files.sort_by(|a, b| {
            let (na, nb) = (slide_number(a), slide_number(b));
            match (na, nb) {
                (Some(na), Some(nb)) => na.cmp(&nb).then_with(|| a.cmp(b)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.cmp(b),
            }
        });

        log::debug!("Found {} slide images in {}", files.len(), dir.display());

        let expected = files.len();
        Ok(Self { files, expected })
    }

    /// Expect exactly `count` slides. Missing files fail at capture time.
    pub fn with_slide_count(mut self, count: usize) -> Self {
        self.expected = count;
        self
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl SlideSource for DirectorySource {
    fn slide_count(&self) -> usize {
        self.expected
    }

    fn capture(&mut self, index: usize) -> Result<Frame> {
        let path = self.files.get(index).ok_or_else(|| Error::CaptureFailure {
            slide: index,
            message: format!("no image for slide {} ({} found)", index, self.files.len()),
        })?;
        Frame::open(index, path)
    }

    fn advance(&mut self) -> Result<()> {
        Ok(())
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Extract the slide number from a name like "slide_003.png".
fn slide_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    TRAILING_NUMBER_REGEX
        .captures(stem)
        .and_then(|caps| caps[1].parse().ok())
}

/// Frames produced by external commands.
///
/// `capture` runs the screenshot command with `{output}` replaced by a path in
/// a private temporary directory; `advance` runs the next-slide command and
/// then sleeps for the settle delay. The temporary directory and any
/// screenshots left in it are removed when the source is dropped, whether
/// the run succeeded or not.
#[derive(Debug)]
pub struct CommandSource {
    capture_command: Vec<String>,
    advance_command: Option<Vec<String>>,
    slides: usize,
    settle_delay: Duration,
    initial_delay: Duration,
    started: bool,
    current: usize,
    workdir: TempDir,
}

impl CommandSource {
    /// Create a source running `capture_command` once per slide.
    ///
    /// Commands are split on whitespace and run without a shell.
    pub fn new(capture_command: &str, slides: usize) -> Result<Self> {
        let capture_command = split_command(capture_command)?;
        if !capture_command.iter().any(|arg| arg.contains(OUTPUT_PLACEHOLDER)) {
            return Err(Error::InvalidConfig(format!(
                "capture command must contain {}",
                OUTPUT_PLACEHOLDER
            )));
        }

        let workdir = tempfile::Builder::new().prefix("slidecap-frames-").tempdir()?;

        Ok(Self {
            capture_command,
            advance_command: None,
            slides,
            settle_delay: Duration::from_secs(4),
            initial_delay: Duration::ZERO,
            started: false,
            current: 0,
            workdir,
        })
    }

    /// Command that moves the presentation to the next slide.
    pub fn with_advance_command(mut self, command: &str) -> Result<Self> {
        self.advance_command = Some(split_command(command)?);
        Ok(self)
    }

    /// Fixed wait after each advance.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Fixed wait before the first capture.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    fn screenshot_path(&self, index: usize) -> PathBuf {
        self.workdir.path().join(format!("slide_{:03}.png", index))
    }
}

impl SlideSource for CommandSource {
    fn slide_count(&self) -> usize {
        self.slides
    }

    fn capture(&mut self, index: usize) -> Result<Frame> {
        if !self.started {
            self.started = true;
            if !self.initial_delay.is_zero() {
                log::info!("Waiting {:?} for the presentation to load", self.initial_delay);
                thread::sleep(self.initial_delay);
            }
        }

        self.current = index;
        let path = self.screenshot_path(index);
        let output = path.to_string_lossy();
        let args: Vec<String> = self
            .capture_command
            .iter()
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &output))
            .collect();

        run_command(&args).map_err(|message| Error::CaptureFailure {
            slide: index,
            message,
        })?;

        if !path.exists() {
            return Err(Error::CaptureFailure {
                slide: index,
                message: format!("screenshot command did not create {}", path.display()),
            });
        }

        let frame = Frame::open(index, &path);
        if let Err(e) = std::fs::remove_file(&path) {
            log::debug!("Could not remove {}: {}", path.display(), e);
        }
        frame
    }

    fn advance(&mut self) -> Result<()> {
        if let Some(command) = &self.advance_command {
            run_command(command).map_err(|message| Error::CaptureFailure {
                slide: self.current + 1,
                message: format!("advance failed: {}", message),
            })?;
        }
        thread::sleep(self.settle_delay);
        Ok(())
    }
}

fn split_command(command: &str) -> Result<Vec<String>> {
    let parts: Vec<String> = command.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        return Err(Error::InvalidConfig("empty command".to_string()));
    }
    Ok(parts)
}

fn run_command(args: &[String]) -> std::result::Result<(), String> {
    let (program, rest) = args.split_first().ok_or_else(|| "empty command".to_string())?;
    let output = Command::new(program)
        .args(rest)
        .output()
        .map_err(|e| format!("failed to run {}: {}", program, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} exited with {}: {}", program, output.status, stderr.trim()));
    }
    Ok(())
}
