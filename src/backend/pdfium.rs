//! PDFium-backed [`DocumentCodec`] and [`PageRasterizer`].
//!
//! Every call binds the library, does its work and drops the binding again;
//! nothing PDFium-owned outlives a call. All methods block and are meant to
//! run on a blocking thread (`spawn_blocking`) when driven from async code.
//!
//! PDF user space has its origin at the bottom-left corner. The model uses a
//! top-left origin, so every placement is flipped here:
//! `pdf_y = page_height - model_y`.

use super::{DocumentCodec, ImageCodec, PageRasterizer, PngCodec};
use crate::error::InvertError;
use crate::model::{
    Bitmap, Content, Document, Page, PageBody, SourceBytes, SourcePage, Scale, StandardFont,
};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rendering engine backed by a PDFium shared library.
#[derive(Clone)]
pub struct PdfiumBackend {
    library: PathBuf,
    password: Option<String>,
    images: PngCodec,
}

impl PdfiumBackend {
    /// Use the library at `library`.
    pub fn new(library: impl Into<PathBuf>) -> Self {
        Self {
            library: library.into(),
            password: None,
            images: PngCodec,
        }
    }

    /// Locate (and if needed download) a library via `pdfium-fetch`.
    pub fn locate() -> Result<Self, InvertError> {
        let located = pdfium_fetch::locate(None)
            .map_err(|e| InvertError::PdfiumBindingFailed(e.to_string()))?;
        info!(
            "Using PDFium at {} ({:?})",
            located.path.display(),
            located.source
        );
        Ok(Self::new(located.path.clone()))
    }

    /// Password tried on every input document.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.set_password(password);
        self
    }

    pub fn library(&self) -> &Path {
        &self.library
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    fn bind(&self) -> Result<Pdfium, InvertError> {
        pdfium_fetch::bind(&self.library).map_err(|e| InvertError::PdfiumBindingFailed(e.to_string()))
    }

    fn load<'a>(
        &'a self,
        pdfium: &'a Pdfium,
        bytes: &'a [u8],
        document: usize,
    ) -> Result<PdfDocument<'a>, InvertError> {
        pdfium
            .load_pdf_from_byte_slice(bytes, self.password.as_deref())
            .map_err(|e| {
                let detail = format!("{:?}", e);
                if detail.contains("Password") || detail.contains("password") {
                    if self.password.is_some() {
                        InvertError::WrongPassword { document }
                    } else {
                        InvertError::PasswordRequired { document }
                    }
                } else {
                    InvertError::CorruptDocument { document, detail }
                }
            })
    }

    /// Append `page` (composed content only) to `target`.
    fn write_composed(&self, target: &mut PdfDocument<'_>, page: &Page) -> Result<(), InvertError> {
        let write_err = |e: PdfiumError| InvertError::SerialiseFailed(format!("{:?}", e));

        let helvetica = target.fonts_mut().helvetica();
        let height = page.height();
        let mut pdf_page = target
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(
                PdfPoints::new(page.width()),
                PdfPoints::new(height),
            ))
            .map_err(write_err)?;

        for content in page.contents() {
            match content {
                Content::Image { rect, image } => {
                    let pixels = self.images.decode(image)?.into_image();
                    pdf_page
                        .objects_mut()
                        .create_image_object(
                            PdfPoints::new(rect.x0),
                            PdfPoints::new(height - rect.y1),
                            &DynamicImage::ImageRgb8(pixels),
                            Some(PdfPoints::new(rect.width())),
                            Some(PdfPoints::new(rect.height())),
                        )
                        .map_err(write_err)?;
                }
                Content::Text(label) => {
                    let font = match label.font {
                        StandardFont::Helvetica => helvetica,
                    };
                    let [r, g, b] = label.color;
                    let mut text = pdf_page
                        .objects_mut()
                        .create_text_object(
                            PdfPoints::new(label.origin.x),
                            PdfPoints::new(height - label.origin.y),
                            &label.text,
                            font,
                            PdfPoints::new(label.font_size),
                        )
                        .map_err(write_err)?;
                    text.set_fill_color(PdfColor::new(r, g, b, 255))
                        .map_err(write_err)?;
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for PdfiumBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfiumBackend")
            .field("library", &self.library)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("images", &self.images)
            .finish()
    }
}

/// A source that parsed once but fails to load again while rasterising is
/// reported against the page being rendered.
fn reload_failed(page: usize, err: InvertError) -> InvertError {
    match err {
        InvertError::CorruptDocument { detail, .. } => {
            InvertError::RasterisationFailed { page, detail }
        }
        other => other,
    }
}

/// Render page `index` of `pdf` to exactly the size `scale` dictates for `page`.
fn render_page(
    pdf: &PdfDocument<'_>,
    index: usize,
    page: &Page,
    scale: Scale,
    page_no: usize,
) -> Result<Bitmap, InvertError> {
    let render_err = |e: PdfiumError| InvertError::RasterisationFailed {
        page: page_no,
        detail: format!("{:?}", e),
    };

    let (width, height) = scale.pixel_size(page.width(), page.height());
    let pdf_page = pdf.pages().get(index as u16).map_err(render_err)?;
    let config = PdfRenderConfig::new()
        .set_target_width(width as i32)
        .set_maximum_height(height as i32);
    let rendered = pdf_page.render_with_config(&config).map_err(render_err)?;

    let mut bitmap = Bitmap::from_dynamic(rendered.as_image());
    if (bitmap.width(), bitmap.height()) != (width, height) {
        // Rounding inside PDFium can be off by a pixel; the contract is exact.
        bitmap = Bitmap::new(image::imageops::resize(
            bitmap.as_image(),
            width,
            height,
            image::imageops::FilterType::Triangle,
        ));
    }
    Ok(bitmap)
}

impl DocumentCodec for PdfiumBackend {
    fn parse(&self, bytes: &[u8], document: usize) -> Result<Document, InvertError> {
        let pdfium = self.bind()?;
        let source = SourceBytes::new(bytes);
        let pdf = self.load(&pdfium, source.as_bytes(), document)?;

        let mut parsed = Document::new();
        for (index, page) in pdf.pages().iter().enumerate() {
            parsed.push(Page::from_source(
                page.width().value,
                page.height().value,
                SourcePage {
                    document: source.clone(),
                    index,
                },
            ));
        }

        debug!(document, pages = parsed.page_count(), "Parsed PDF");
        Ok(parsed)
    }

    fn serialize(&self, document: &Document) -> Result<Vec<u8>, InvertError> {
        let pdfium = self.bind()?;
        let mut loaded: Vec<(&SourceBytes, PdfDocument<'_>)> = Vec::new();
        let mut out = pdfium
            .create_new_pdf()
            .map_err(|e| InvertError::SerialiseFailed(format!("{:?}", e)))?;

        for page in document.pages() {
            match page.body() {
                PageBody::Source(src) => {
                    let slot = match loaded
                        .iter()
                        .position(|(bytes, _)| bytes.same_document(&src.document))
                    {
                        Some(slot) => slot,
                        None => {
                            let pdf = self.load(&pdfium, src.document.as_bytes(), loaded.len())?;
                            loaded.push((&src.document, pdf));
                            loaded.len() - 1
                        }
                    };
                    let dest = out.pages().len();
                    out.pages_mut()
                        .copy_page_from_document(&loaded[slot].1, src.index as u16, dest)
                        .map_err(|e| InvertError::SerialiseFailed(format!("{:?}", e)))?;
                }
                PageBody::Composed(_) => self.write_composed(&mut out, page)?,
            }
        }

        let bytes = out
            .save_to_bytes()
            .map_err(|e| InvertError::SerialiseFailed(format!("{:?}", e)))?;
        debug!(
            pages = document.page_count(),
            bytes = bytes.len(),
            "Serialised PDF"
        );
        Ok(bytes)
    }

    fn set_password(&mut self, password: Option<String>) {
        self.password = password;
    }
}

impl PageRasterizer for PdfiumBackend {
    fn rasterize(&self, page: &Page, scale: Scale) -> Result<Bitmap, InvertError> {
        self.rasterize_all(std::slice::from_ref(page), scale)?
            .pop()
            .ok_or_else(|| InvertError::Internal("rasteriser returned no bitmap".into()))
    }

    fn rasterize_all(&self, pages: &[Page], scale: Scale) -> Result<Vec<Bitmap>, InvertError> {
        let pdfium = self.bind()?;
        let mut current: Option<(&SourceBytes, PdfDocument<'_>)> = None;
        let mut bitmaps = Vec::with_capacity(pages.len());

        for (i, page) in pages.iter().enumerate() {
            let bitmap = match page.body() {
                PageBody::Source(src) => {
                    let stale = !matches!(
                        &current,
                        Some((bytes, _)) if bytes.same_document(&src.document)
                    );
                    if stale {
                        drop(current.take());
                        let pdf = self
                            .load(&pdfium, src.document.as_bytes(), 0)
                            .map_err(|e| reload_failed(src.index + 1, e))?;
                        current = Some((&src.document, pdf));
                    }
                    match &current {
                        Some((_, pdf)) => render_page(pdf, src.index, page, scale, src.index + 1)?,
                        None => return Err(InvertError::Internal("source not loaded".into())),
                    }
                }
                PageBody::Composed(_) => {
                    let mut scratch = pdfium
                        .create_new_pdf()
                        .map_err(|e| InvertError::SerialiseFailed(format!("{:?}", e)))?;
                    self.write_composed(&mut scratch, page)?;
                    render_page(&scratch, 0, page, scale, i + 1)?
                }
            };

            debug!(
                "Rendered page {} → {}x{} px",
                i + 1,
                bitmap.width(),
                bitmap.height()
            );
            bitmaps.push(bitmap);
        }

        Ok(bitmaps)
    }
}
