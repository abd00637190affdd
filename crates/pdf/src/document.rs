//! Document aggregation and PDF output.

use std::io::{BufWriter, Write};
use std::path::Path;

use lopdf::{dictionary, Dictionary, Object, Stream};
use slidecap_core::{Error, Result};

use crate::compositor::{Page, FONT_RESOURCE, IMAGE_RESOURCE, INVISIBLE_GSTATE};

/// Default value of the Producer entry.
const PRODUCER: &str = concat!("slidecap ", env!("CARGO_PKG_VERSION"));

/// An ordered sequence of pages, one per captured slide.
///
/// Pages are kept in the order they were appended. The document is a single
/// writer structure; it is not meant to be shared across threads while
/// being filled.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pages: Vec<Page>,
    title: Option<String>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect pages in exactly the order given.
    pub fn aggregate(pages: impl IntoIterator<Item = Page>) -> Self {
        let mut document = Self::new();
        for page in pages {
            document.push(page);
        }
        document
    }

    /// Collect pages composited out of order, ordering them by slide index.
    ///
    /// Two pages for the same slide are rejected rather than silently
    /// dropping one.
    pub fn from_indexed(mut pages: Vec<Page>) -> Result<Self> {
        pages.sort_by_key(Page::slide);

        if let Some(pair) = pages.windows(2).find(|w| w[0].slide() == w[1].slide()) {
            return Err(Error::PdfError(format!(
                "Two pages supplied for slide {}",
                pair[0].slide()
            )));
        }

        Ok(Self::aggregate(pages))
    }

    /// Set the document title written to the Info dictionary.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append a page after all existing pages.
    pub fn push(&mut self, page: Page) {
        log::debug!("Appending slide {} as page {}", page.slide(), self.pages.len() + 1);
        self.pages.push(page);
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Total number of invisible text draws across all pages.
    pub fn text_draw_count(&self) -> usize {
        self.pages.iter().map(|p| p.text_draws().len()).sum()
    }

    /// Build the PDF object graph.
    pub fn to_pdf(&self) -> Result<lopdf::Document> {
        if self.pages.is_empty() {
            return Err(Error::PdfError("Document has no pages".to_string()));
        }

        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        // Fill and stroke alpha 0: glyphs exist for search and selection only.
        let gstate_id = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => 0,
            "CA" => 0,
        });

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());

        for page in &self.pages {
            let width = i64::from(page.width());
            let height = i64::from(page.height());

            let image = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                },
                page.background().as_raw().clone(),
            );
            let image_id = doc.add_object(image);

            let content = page
                .content()
                .encode()
                .map_err(|e| Error::PdfError(format!("Failed to encode slide {}: {}", page.slide(), e)))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));

            let resources = dictionary! {
                "XObject" => dictionary! { IMAGE_RESOURCE => image_id },
                "Font" => dictionary! { FONT_RESOURCE => font_id },
                "ExtGState" => dictionary! { INVISIBLE_GSTATE => gstate_id },
            };

            let media_box: Vec<Object> = vec![0.into(), 0.into(), width.into(), height.into()];
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => media_box,
                "Contents" => content_id,
                "Resources" => resources,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let info_id = doc.add_object(self.info());
        doc.trailer.set("Info", info_id);

        doc.compress();

        Ok(doc)
    }

    fn info(&self) -> Dictionary {
        let mut info = dictionary! {
            "Producer" => Object::string_literal(PRODUCER),
        };
        if let Some(title) = &self.title {
            info.set("Title", Object::string_literal(title.as_str()));
        }
        info
    }

    /// Serialize to PDF bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut pdf = self.to_pdf()?;
        let mut bytes = Vec::new();
        pdf.save_to(&mut bytes)
            .map_err(|e| Error::PdfError(format!("Failed to serialize PDF: {}", e)))?;
        Ok(bytes)
    }

    /// Write the document to `path`.
    ///
    /// The file is written next to the target under a temporary name and
    /// renamed into place, so `path` either receives the complete document
    /// or is left untouched. The document is only borrowed and can be
    /// written again after a failure.
    pub fn write(&self, path: &Path) -> Result<()> {
        let write_failure = |message: String| Error::WriteFailure {
            path: path.to_path_buf(),
            message,
        };

        let mut pdf = self.to_pdf()?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix(".slidecap-").suffix(".pdf.part");
        // Regular file mode, still subject to the umask.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }

        let mut temp = builder
            .tempfile_in(dir)
            .map_err(|e| write_failure(format!("Failed to create temporary file: {}", e)))?;

        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            pdf.save_to(&mut writer)
                .map_err(|e| write_failure(format!("Failed to serialize PDF: {}", e)))?;
            writer
                .flush()
                .map_err(|e| write_failure(format!("Failed to flush: {}", e)))?;
        }

        // Overwriting keeps the mode of the existing document.
        if let Ok(existing) = std::fs::metadata(path) {
            temp.as_file()
                .set_permissions(existing.permissions())
                .map_err(|e| write_failure(format!("Failed to set permissions: {}", e)))?;
        }

        temp.as_file()
            .sync_all()
            .map_err(|e| write_failure(format!("Failed to sync: {}", e)))?;

        temp.persist(path)
            .map_err(|e| write_failure(format!("Failed to move into place: {}", e.error)))?;

        log::info!("Wrote {} pages to {}", self.pages.len(), path.display());

        Ok(())
    }
}
