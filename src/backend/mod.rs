//! Seams to the external capabilities the pipeline relies on.
//!
//! Decoding arbitrary PDFs and flattening vector/text content into pixels
//! is delegated to a rendering engine. The pipeline only sees three narrow
//! traits:
//!
//! * [`DocumentCodec`] — bytes ⇄ [`Document`]
//! * [`PageRasterizer`] — [`Page`] → [`Bitmap`] at a given [`Scale`]
//! * [`ImageCodec`] — [`Bitmap`] ⇄ encoded raster
//!
//! [`PdfiumBackend`] implements the first two on top of PDFium;
//! [`PngCodec`] implements the third with the `image` crate.

pub mod pdfium;

pub use pdfium::PdfiumBackend;

use crate::error::InvertError;
use crate::model::{Bitmap, Document, EncodedImage, Page, RasterFormat, Scale};
use std::io::Cursor;

/// Parse and serialise whole documents.
///
/// `document` in [`DocumentCodec::parse`] is the caller's index for the
/// input, used only to label decode errors.
pub trait DocumentCodec: Send + Sync {
    fn parse(&self, bytes: &[u8], document: usize) -> Result<Document, InvertError>;
    fn serialize(&self, document: &Document) -> Result<Vec<u8>, InvertError>;

    /// Password tried on every document parsed afterwards. Codecs without
    /// encryption support ignore it.
    fn set_password(&mut self, _password: Option<String>) {}
}

/// Flatten pages into RGB bitmaps.
///
/// The output of [`rasterize`](PageRasterizer::rasterize) must be exactly
/// `scale.pixel_size(page.width(), page.height())` pixels.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, page: &Page, scale: Scale) -> Result<Bitmap, InvertError>;

    /// Rasterise `pages` in order. Backends override this when loading a
    /// shared source once is cheaper than once per page.
    fn rasterize_all(&self, pages: &[Page], scale: Scale) -> Result<Vec<Bitmap>, InvertError> {
        pages.iter().map(|p| self.rasterize(p, scale)).collect()
    }
}

/// Everything the pipeline needs from a rendering engine.
pub trait PdfBackend: DocumentCodec + PageRasterizer {}

impl<T: DocumentCodec + PageRasterizer> PdfBackend for T {}

/// Encode bitmaps for embedding and decode them back.
pub trait ImageCodec: Send + Sync {
    fn encode(&self, bitmap: &Bitmap, format: RasterFormat) -> Result<EncodedImage, InvertError>;
    fn decode(&self, image: &EncodedImage) -> Result<Bitmap, InvertError>;
}

/// Lossless PNG via the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl ImageCodec for PngCodec {
    fn encode(&self, bitmap: &Bitmap, format: RasterFormat) -> Result<EncodedImage, InvertError> {
        let RasterFormat::Png = format;
        let mut data = Vec::new();
        bitmap
            .as_image()
            .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
            .map_err(|e| InvertError::ImageEncode {
                page: 0,
                detail: e.to_string(),
            })?;

        Ok(EncodedImage {
            format,
            width: bitmap.width(),
            height: bitmap.height(),
            data,
        })
    }

    fn decode(&self, image: &EncodedImage) -> Result<Bitmap, InvertError> {
        let format = match image.format {
            RasterFormat::Png => image::ImageFormat::Png,
        };
        let decoded = image::load_from_memory_with_format(&image.data, format)
            .map_err(|e| InvertError::ImageDecode(e.to_string()))?;
        Ok(Bitmap::from_dynamic(decoded))
    }
}
