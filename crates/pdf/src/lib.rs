//! Searchable PDF assembly: slide raster as visible background, OCR words as
//! an invisible text layer, one page per slide.

pub mod compositor;
pub mod document;
pub mod encoding;

pub use compositor::{Compositor, Page, TextDraw};
pub use document::Document;
pub use encoding::encode_win_ansi;
