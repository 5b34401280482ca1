//! Stage A: rasterise every page of a document, invert it and rebuild it as
//! a page whose only content is the inverted image.
//!
//! Rasterisation is sequential (the backend owns the source document);
//! inversion and PNG encoding of the resulting bitmaps run on the rayon pool
//! and are collected back by index.

use crate::backend::{ImageCodec, PageRasterizer};
use crate::error::InvertError;
use crate::model::{Bitmap, Content, Document, Page, RasterFormat, Rect, Scale};
use crate::pipeline::invert::invert_in_place;
use rayon::prelude::*;
use tracing::debug;

/// Page sized to `bitmap` (one unit per pixel) showing it full-bleed.
///
/// `page_no` is 1-based and only labels errors.
pub fn rebuild_page(
    bitmap: &Bitmap,
    images: &dyn ImageCodec,
    page_no: usize,
) -> Result<Page, InvertError> {
    let image = images
        .encode(bitmap, RasterFormat::Png)
        .map_err(|e| match e {
            InvertError::ImageEncode { detail, .. } => InvertError::ImageEncode {
                page: page_no,
                detail,
            },
            other => other,
        })?;

    let (width, height) = (bitmap.width() as f32, bitmap.height() as f32);
    let mut page = Page::blank(width, height);
    page.push(Content::Image {
        rect: Rect::from_size(width, height),
        image,
    });
    Ok(page)
}

/// Rasterise → invert → rebuild every page of `source`, keeping page order.
pub fn invert_pages<R>(
    rasterizer: &R,
    images: &dyn ImageCodec,
    source: &Document,
    scale: Scale,
) -> Result<Document, InvertError>
where
    R: PageRasterizer + ?Sized,
{
    let bitmaps = rasterizer.rasterize_all(source.pages(), scale)?;
    if bitmaps.len() != source.page_count() {
        return Err(InvertError::Internal(format!(
            "rasteriser returned {} bitmaps for {} pages",
            bitmaps.len(),
            source.page_count()
        )));
    }

    let pages = bitmaps
        .into_par_iter()
        .enumerate()
        .map(|(i, mut bitmap)| {
            invert_in_place(&mut bitmap);
            let page = rebuild_page(&bitmap, images, i + 1)?;
            debug!(
                "Inverted page {} ({}x{})",
                i + 1,
                bitmap.width(),
                bitmap.height()
            );
            Ok::<_, InvertError>(page)
        })
        .collect::<Result<Vec<_>, InvertError>>()?;

    Ok(Document::from_pages(pages))
}
