//! The capture run: crop, binarize, detect, composite, accumulate, write.
//!
//! Slides are processed strictly one after another. The first failure on any
//! slide stops the run and nothing is written; a document is only produced
//! once every expected slide has a page.

use std::path::{Path, PathBuf};

use slidecap_core::{Error, Frame, Result, RunConfig, TokenNormalizer};
use slidecap_ocr::{Preprocessor, TextDetector};
use slidecap_pdf::{Compositor, Document, Page};

use crate::source::SlideSource;

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Slides captured.
    pub slides: usize,
    /// Pages in the written document.
    pub pages: usize,
    /// Invisible words placed across all pages.
    pub text_draws: usize,
    /// Where the document was written.
    pub output: PathBuf,
}

/// Sequential slide-to-PDF pipeline.
pub struct Pipeline {
    config: RunConfig,
    detector: Box<dyn TextDetector>,
    preprocessor: Preprocessor,
    compositor: Compositor,
    normalizer: TokenNormalizer,
    title: Option<String>,
}

impl Pipeline {
    /// Create a pipeline with a validated configuration and an injected detector.
    pub fn new(config: RunConfig, detector: Box<dyn TextDetector>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            preprocessor: Preprocessor::from_config(&config),
            compositor: Compositor::from_config(&config),
            normalizer: TokenNormalizer::new(),
            config,
            detector,
            title: None,
        })
    }

    /// Title stored in the output document's metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Turn one raw frame into a finished page.
    pub fn process_frame(&self, frame: &Frame) -> Result<Page> {
        let slide = frame.slide();

        let cropped = frame.crop(self.config.crop_margins())?;
        let ocr_frame = self.preprocessor.preprocess(&cropped);

        let tokens = self.detector.detect(&ocr_frame).map_err(|e| match e {
            e @ Error::DetectionFailure { .. } => e,
            other => Error::DetectionFailure {
                slide,
                message: other.to_string(),
            },
        })?;
        let tokens = self.normalizer.normalize_tokens(tokens);

        log::debug!("Slide {}: {} tokens from {}", slide, tokens.len(), self.detector.name());

        Ok(self.compositor.composite(cropped, &tokens))
    }

    /// Capture every slide of `source` and collect the pages in order.
    pub fn collect(&self, source: &mut dyn SlideSource) -> Result<Document> {
        let count = source.slide_count();
        if count == 0 {
            return Err(Error::InvalidConfig("no slides to capture".to_string()));
        }

        let mut document = Document::new();
        if let Some(title) = &self.title {
            document = document.with_title(title.clone());
        }

        for index in 0..count {
            log::info!("Capturing slide {}/{}", index + 1, count);

            let frame = source.capture(index)?;
            if frame.slide() != index {
                return Err(Error::CaptureFailure {
                    slide: index,
                    message: format!("source returned slide {}", frame.slide()),
                });
            }

            let page = self.process_frame(&frame)?;
            document.push(page);

            if index + 1 < count {
                source.advance()?;
            }
        }

        Ok(document)
    }

    /// Capture all slides and write the document to `output`.
    ///
    /// No file is created unless every slide succeeded.
    pub fn run(&self, source: &mut dyn SlideSource, output: &Path) -> Result<RunReport> {
        let document = self.collect(source)?;
        document.write(output)?;

        Ok(RunReport {
            slides: source.slide_count(),
            pages: document.len(),
            text_draws: document.text_draw_count(),
            output: output.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use slidecap_core::TextToken;
    use slidecap_ocr::OcrFrame;
    use slidecap_pdf::TextDraw;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// In-memory frames; `None` stands for a slide that cannot be captured.
    struct MockSource {
        frames: Vec<Option<RgbImage>>,
        advances: Rc<RefCell<usize>>,
    }

    impl MockSource {
        fn new(count: usize, width: u32, height: u32) -> Self {
            Self {
                frames: (0..count)
                    .map(|i| Some(RgbImage::from_pixel(width, height, Rgb([i as u8 * 40, 200, 200]))))
                    .collect(),
                advances: Rc::new(RefCell::new(0)),
            }
        }
    }

    impl SlideSource for MockSource {
        fn slide_count(&self) -> usize {
            self.frames.len()
        }

        fn capture(&mut self, index: usize) -> Result<Frame> {
            match self.frames.get(index).cloned().flatten() {
                Some(image) => Frame::new(index, image),
                None => Err(Error::CaptureFailure {
                    slide: index,
                    message: "window closed".to_string(),
                }),
            }
        }

        fn advance(&mut self) -> Result<()> {
            *self.advances.borrow_mut() += 1;
            Ok(())
        }
    }

    /// Per-slide scripted detector results.
    struct ScriptedDetector {
        script: Vec<std::result::Result<Vec<TextToken>, String>>,
        seen: Rc<RefCell<Vec<(usize, u32, u32)>>>,
    }

    impl ScriptedDetector {
        fn new(script: Vec<std::result::Result<Vec<TextToken>, String>>) -> Self {
            Self {
                script,
                seen: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl TextDetector for ScriptedDetector {
        fn name(&self) -> &str {
            "scripted"
        }

        fn detect(&self, frame: &OcrFrame) -> Result<Vec<TextToken>> {
            self.seen
                .borrow_mut()
                .push((frame.slide(), frame.width(), frame.height()));
            match &self.script[frame.slide()] {
                Ok(tokens) => Ok(tokens.clone()),
                Err(message) => Err(Error::DetectionFailure {
                    slide: frame.slide(),
                    message: message.clone(),
                }),
            }
        }
    }

    fn hello() -> Vec<TextToken> {
        vec![TextToken::new("Hello", 100, 50, 80, 20)]
    }

    #[test]
    fn test_three_slide_scenario() {
        let detector = ScriptedDetector::new(vec![Ok(hello()), Ok(hello()), Ok(hello())]);
        let seen = detector.seen.clone();
        let pipeline = Pipeline::new(
            RunConfig::new().with_crop_margins(80, 80),
            Box::new(detector),
        )
        .unwrap();

        let mut source = MockSource::new(3, 1920, 1080);
        let advances = source.advances.clone();
        let document = pipeline.collect(&mut source).unwrap();

        assert_eq!(document.len(), 3);
        for (i, page) in document.pages().iter().enumerate() {
            assert_eq!(page.slide(), i);
            assert_eq!((page.width(), page.height()), (1920, 920));
            assert_eq!(
                page.text_draws(),
                &[TextDraw {
                    text: "Hello".to_string(),
                    x: 100,
                    y: 850,
                    font_size: 20.0,
                }]
            );
        }

        // Detector saw the cropped geometry, in slide order.
        assert_eq!(
            *seen.borrow(),
            vec![(0, 1920, 920), (1, 1920, 920), (2, 1920, 920)]
        );
        assert_eq!(*advances.borrow(), 2);
    }

    #[test]
    fn test_background_is_cropped_frame() {
        let pipeline = Pipeline::new(
            RunConfig::new().with_crop_margins(2, 3),
            Box::new(ScriptedDetector::new(vec![Ok(vec![])])),
        )
        .unwrap();

        let mut image = RgbImage::from_pixel(6, 10, Rgb([0, 0, 0]));
        image.put_pixel(4, 2, Rgb([9, 8, 7]));
        let frame = Frame::new(0, image).unwrap();

        let page = pipeline.process_frame(&frame).unwrap();
        assert_eq!((page.width(), page.height()), (6, 5));
        assert_eq!(page.background().get_pixel(4, 0), &Rgb([9, 8, 7]));
    }

    #[test]
    fn test_slide_without_text_still_yields_page() {
        let detector = ScriptedDetector::new(vec![Ok(hello()), Ok(vec![]), Ok(hello())]);
        let pipeline = Pipeline::new(RunConfig::new().with_crop_margins(0, 0), Box::new(detector)).unwrap();

        let document = pipeline.collect(&mut MockSource::new(3, 300, 200)).unwrap();
        assert_eq!(document.len(), 3);
        assert!(document.pages()[1].text_draws().is_empty());
        assert_eq!(document.text_draw_count(), 2);
    }

    #[test]
    fn test_blank_tokens_filtered_before_compositing() {
        let tokens = vec![
            TextToken::new("  ", 0, 0, 10, 10),
            TextToken::new(" Hello\n", 100, 50, 80, 20),
        ];
        let detector = ScriptedDetector::new(vec![Ok(tokens)]);
        let pipeline = Pipeline::new(RunConfig::new().with_crop_margins(0, 0), Box::new(detector)).unwrap();

        let document = pipeline.collect(&mut MockSource::new(1, 300, 200)).unwrap();
        let draws = document.pages()[0].text_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].text, "Hello");
        assert_eq!(draws[0].y, 200 - 50 - 20);
    }

    #[test]
    fn test_detection_failure_aborts_without_output() {
        let detector = ScriptedDetector::new(vec![
            Ok(hello()),
            Err("engine crashed".to_string()),
            Ok(hello()),
        ]);
        let seen = detector.seen.clone();
        let pipeline = Pipeline::new(RunConfig::new().with_crop_margins(10, 10), Box::new(detector)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("deck.pdf");
        let result = pipeline.run(&mut MockSource::new(3, 300, 200), &output);

        assert!(matches!(result, Err(Error::DetectionFailure { slide: 1, .. })));
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        // Slide 3 was never attempted.
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_missing_frame_aborts() {
        let detector = ScriptedDetector::new(vec![Ok(hello()), Ok(hello()), Ok(hello())]);
        let pipeline = Pipeline::new(RunConfig::new().with_crop_margins(0, 0), Box::new(detector)).unwrap();

        let mut source = MockSource::new(3, 300, 200);
        source.frames[2] = None;

        let result = pipeline.collect(&mut source);
        assert!(matches!(result, Err(Error::CaptureFailure { slide: 2, .. })));
    }

    #[test]
    fn test_crop_larger_than_frame_aborts() {
        let detector = ScriptedDetector::new(vec![Ok(hello())]);
        let pipeline = Pipeline::new(RunConfig::new().with_crop_margins(100, 100), Box::new(detector)).unwrap();

        let result = pipeline.collect(&mut MockSource::new(1, 300, 200));
        assert!(matches!(result, Err(Error::InvalidCrop { .. })));
    }

    #[test]
    fn test_empty_source_rejected_before_capture() {
        let detector = ScriptedDetector::new(vec![]);
        let pipeline = Pipeline::new(RunConfig::new(), Box::new(detector)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("deck.pdf");
        let result = pipeline.run(&mut MockSource::new(0, 300, 200), &output);

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let detector = ScriptedDetector::new(vec![]);
        let result = Pipeline::new(RunConfig::new().with_threshold(4, 2), Box::new(detector));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_run_writes_reopenable_document() {
        let detector = ScriptedDetector::new(vec![Ok(hello()), Ok(vec![]), Ok(hello())]);
        let pipeline = Pipeline::new(RunConfig::new().with_crop_margins(10, 10), Box::new(detector))
            .unwrap()
            .with_title("Demo deck");

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("deck.pdf");
        let report = pipeline.run(&mut MockSource::new(3, 300, 200), &output).unwrap();

        assert_eq!(
            report,
            RunReport {
                slides: 3,
                pages: 3,
                text_draws: 2,
                output: output.clone(),
            }
        );

        let reopened = lopdf::Document::load(&output).unwrap();
        assert_eq!(reopened.get_pages().len(), 3);
    }
}
