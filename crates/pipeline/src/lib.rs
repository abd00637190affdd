//! Slide sources and the sequential capture pipeline that turns them into
//! one searchable PDF.

pub mod runner;
pub mod source;

pub use runner::{Pipeline, RunReport};
pub use source::{CommandSource, DirectorySource, SlideSource};
