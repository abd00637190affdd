//! Page compositing: one cropped slide plus its detected words becomes one
//! searchable page.
//!
//! Pages are sized 1 point per pixel. The slide raster is the only visible
//! content; every token is drawn on top as text whose fill alpha is 0, so it
//! can be searched and selected but never shows.
//!
//! Image boxes have a top-left origin while PDF user space has a bottom-left
//! origin, so a box is placed at `(left, page_height - top - height)`.

use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};
use slidecap_core::{CroppedFrame, RunConfig, TextToken};

use crate::encoding::encode_win_ansi;

/// Resource name of the background image XObject.
pub const IMAGE_RESOURCE: &str = "Im0";

/// Resource name of the invisible-text font.
pub const FONT_RESOURCE: &str = "F0";

/// Resource name of the zero-alpha graphics state.
pub const INVISIBLE_GSTATE: &str = "GS0";

/// One invisible text draw, already in PDF user space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDraw {
    pub text: String,
    /// Baseline-origin x in points.
    pub x: i64,
    /// Baseline-origin y in points, measured from the bottom edge.
    pub y: i64,
    pub font_size: f32,
}

/// A finished page. Immutable once built.
#[derive(Debug, Clone)]
pub struct Page {
    slide: usize,
    background: RgbImage,
    text: Vec<TextDraw>,
}

impl Page {
    /// Slide index this page was built from.
    pub fn slide(&self) -> usize {
        self.slide
    }

    /// Page width in points.
    pub fn width(&self) -> u32 {
        self.background.width()
    }

    /// Page height in points.
    pub fn height(&self) -> u32 {
        self.background.height()
    }

    pub fn background(&self) -> &RgbImage {
        &self.background
    }

    pub fn text_draws(&self) -> &[TextDraw] {
        &self.text
    }

    /// Content stream operations for this page.
    ///
    /// The background is painted first across the whole media box. Text
    /// follows inside its own save/restore block with the zero-alpha
    /// graphics state active.
    pub fn content(&self) -> Content {
        let width = i64::from(self.width());
        let height = i64::from(self.height());

        let mut operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![width.into(), 0.into(), 0.into(), height.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.into())]),
            Operation::new("Q", vec![]),
        ];

        if !self.text.is_empty() {
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "gs",
                vec![Object::Name(INVISIBLE_GSTATE.into())],
            ));
            operations.push(Operation::new("BT", vec![]));

            for draw in &self.text {
                operations.push(Operation::new(
                    "Tf",
                    vec![Object::Name(FONT_RESOURCE.into()), draw.font_size.into()],
                ));
                operations.push(Operation::new(
                    "Tm",
                    vec![1.into(), 0.into(), 0.into(), 1.into(), draw.x.into(), draw.y.into()],
                ));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(encode_win_ansi(&draw.text), StringFormat::Literal)],
                ));
            }

            operations.push(Operation::new("ET", vec![]));
            operations.push(Operation::new("Q", vec![]));
        }

        Content { operations }
    }
}

/// Builds pages from cropped frames and tokens.
#[derive(Debug, Clone)]
pub struct Compositor {
    /// Font size as a multiple of the token box height.
    font_size_ratio: f32,
}

impl Default for Compositor {
    fn default() -> Self {
        Self {
            font_size_ratio: 1.0,
        }
    }
}

impl Compositor {
    /// Create a compositor with font size equal to box height.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the run configuration.
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new().with_font_size_ratio(config.font_size_ratio)
    }

    /// Scale the box-height font size heuristic.
    pub fn with_font_size_ratio(mut self, ratio: f32) -> Self {
        self.font_size_ratio = ratio;
        self
    }

    /// Composite one page.
    ///
    /// Blank tokens are skipped. Boxes are not clipped to the page; a box
    /// running past an edge is drawn where it lands.
    pub fn composite(&self, frame: CroppedFrame, tokens: &[TextToken]) -> Page {
        let slide = frame.slide();
        let background = frame.into_image();
        let (width, height) = (background.width(), background.height());

        let text: Vec<TextDraw> = tokens
            .iter()
            .filter(|token| !token.is_blank())
            .map(|token| {
                if token.exceeds(width, height) {
                    log::warn!(
                        "Token {:?} on slide {} extends past the {}x{} page",
                        token.text,
                        slide,
                        width,
                        height
                    );
                }
                self.place(token, height)
            })
            .collect();

        log::debug!(
            "Composited slide {} ({}x{} pt, {} text draws)",
            slide,
            width,
            height,
            text.len()
        );

        Page {
            slide,
            background,
            text,
        }
    }

    /// Flip a token box into PDF user space.
    fn place(&self, token: &TextToken, page_height: u32) -> TextDraw {
        TextDraw {
            text: token.text.trim().to_string(),
            x: i64::from(token.left),
            y: i64::from(page_height) - i64::from(token.top) - i64::from(token.height),
            font_size: token.height as f32 * self.font_size_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn slide(width: u32, height: u32) -> CroppedFrame {
        CroppedFrame::new(0, RgbImage::from_pixel(width, height, Rgb([30, 60, 90])))
    }

    fn operators(content: &Content) -> Vec<&str> {
        content.operations.iter().map(|op| op.operator.as_str()).collect()
    }

    #[test]
    fn test_hello_scenario() {
        let tokens = vec![TextToken::new("Hello", 100, 50, 80, 20)];
        let page = Compositor::new().composite(slide(1920, 920), &tokens);

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

    #[test]
    fn test_coordinate_flip_edges() {
        let page_height = 500;
        let tokens = vec![
            TextToken::new("top", 10, 0, 40, 30),
            TextToken::new("bottom", 10, page_height - 30, 40, 30),
        ];
        let page = Compositor::new().composite(slide(300, page_height), &tokens);

        assert_eq!(page.text_draws()[0].y, i64::from(page_height) - 30);
        assert_eq!(page.text_draws()[1].y, 0);
        assert_eq!(page.text_draws()[1].x, 10);
    }

    #[test]
    fn test_blank_tokens_not_drawn() {
        let tokens = vec![
            TextToken::new("one", 0, 0, 10, 10),
            TextToken::new("  ", 0, 0, 10, 10),
            TextToken::new("", 0, 0, 10, 10),
            TextToken::new("two", 20, 0, 10, 10),
        ];
        let page = Compositor::new().composite(slide(100, 100), &tokens);

        assert_eq!(page.text_draws().len(), 2);
        let content = page.content();
        let tj_count = operators(&content).iter().filter(|op| **op == "Tj").count();
        assert_eq!(tj_count, 2);
    }

    #[test]
    fn test_no_tokens_is_background_only() {
        let page = Compositor::new().composite(slide(64, 48), &[]);
        let content = page.content();

        assert!(page.text_draws().is_empty());
        assert_eq!(operators(&content), vec!["q", "cm", "Do", "Q"]);
    }

    #[test]
    fn test_background_fills_canvas() {
        let page = Compositor::new().composite(slide(1920, 920), &[]);
        let content = page.content();
        let cm = &content.operations[1];

        let values: Vec<i64> = cm.operands.iter().map(|o| o.as_i64().unwrap()).collect();
        assert_eq!(values, vec![1920, 0, 0, 920, 0, 0]);
        assert_eq!(page.background().get_pixel(0, 0), &Rgb([30, 60, 90]));
    }

    #[test]
    fn test_text_drawn_under_invisible_state() {
        let tokens = vec![TextToken::new("Hello", 100, 50, 80, 20)];
        let page = Compositor::new().composite(slide(1920, 920), &tokens);
        let content = page.content();

        assert_eq!(
            operators(&content),
            vec!["q", "cm", "Do", "Q", "q", "gs", "BT", "Tf", "Tm", "Tj", "ET", "Q"]
        );

        let gs = &content.operations[5];
        assert!(matches!(&gs.operands[0], Object::Name(name) if name == INVISIBLE_GSTATE.as_bytes()));

        let tm = &content.operations[8];
        let values: Vec<i64> = tm.operands.iter().map(|o| o.as_i64().unwrap()).collect();
        assert_eq!(values, vec![1, 0, 0, 1, 100, 850]);

        let tj = &content.operations[9];
        assert!(matches!(&tj.operands[0], Object::String(bytes, _) if bytes == b"Hello"));
    }

    #[test]
    fn test_degenerate_and_overflowing_boxes_still_drawn() {
        let tokens = vec![
            TextToken::new("dot", 5, 5, 0, 0),
            TextToken::new("spill", 90, 95, 50, 20),
        ];
        let page = Compositor::new().composite(slide(100, 100), &tokens);

        assert_eq!(page.text_draws().len(), 2);
        assert_eq!(page.text_draws()[0].y, 95);
        assert_eq!(page.text_draws()[0].font_size, 0.0);
        assert_eq!(page.text_draws()[1].y, -15);
    }

    #[test]
    fn test_font_size_ratio() {
        let tokens = vec![TextToken::new("Hello", 0, 0, 80, 20)];
        let page = Compositor::new()
            .with_font_size_ratio(0.75)
            .composite(slide(200, 100), &tokens);
        assert_eq!(page.text_draws()[0].font_size, 15.0);
    }

    #[test]
    fn test_content_encodes() {
        let tokens = vec![TextToken::new("(paren) text", 1, 2, 3, 4)];
        let page = Compositor::new().composite(slide(10, 10), &tokens);
        let bytes = page.content().encode().unwrap();
        let decoded = Content::decode(&bytes).unwrap();
        assert_eq!(decoded.operations.len(), page.content().operations.len());
    }
}
