//! Stage C: grid composition.
//!
//! Source pages are taken in groups of [`GridLayout::slots`]. Each group
//! becomes one output sheet: page `j` of the group is rasterised, scaled
//! uniformly to fit slot `j` and drawn there, then the sheet is stamped with
//! a "Page n" label where `n` counts sheets from 1.
//!
//! ```text
//!  ┌──────────────────────────┐ ─┬─ top_margin
//!  │     ┌────────────────┐   │  │
//!  │     │     slot 0     │   │  slot_height
//!  │     ├────────────────┤   │  │
//!  │     │     slot 1     │   │
//!  │     ├────────────────┤   │
//!  │     │     slot 2     │   │
//!  │     └────────────────┘   │
//!  │               Page n     │
//!  └──────────────────────────┘
//!   side_margin            right_margin
//! ```

use crate::backend::{ImageCodec, PageRasterizer};
use crate::config::{GridLayout, SlotAnchor};
use crate::error::InvertError;
use crate::model::{Content, Document, EncodedImage, Page, RasterFormat, Rect, Scale, StandardFont, TextLabel};
use crate::progress::PipelineProgress;
use rayon::prelude::*;
use tracing::debug;

/// Largest rectangle with the aspect ratio of `width` × `height` that fits
/// inside `slot`, positioned per `anchor`. Upscaling is allowed.
pub fn fit_rect(slot: Rect, width: f32, height: f32, anchor: SlotAnchor) -> Rect {
    if !(width > 0.0 && height > 0.0) {
        return slot;
    }
    let (sx, sy) = (slot.width() / width, slot.height() / height);
    // The bound dimension takes the slot size exactly, so rounding never
    // pushes the image past the slot edge.
    let (w, h) = if sx <= sy {
        (slot.width(), (height * sx).min(slot.height()))
    } else {
        ((width * sy).min(slot.width()), slot.height())
    };
    let (x0, y0) = match anchor {
        SlotAnchor::Center => (
            slot.x0 + (slot.width() - w) / 2.0,
            slot.y0 + (slot.height() - h) / 2.0,
        ),
        SlotAnchor::TopLeft => (slot.x0, slot.y0),
    };
    Rect::new(x0, y0, x0 + w, y0 + h)
}

/// Lays source pages out on fixed-size sheets.
pub struct GridLayoutCompositor<'a, R: ?Sized> {
    rasterizer: &'a R,
    images: &'a dyn ImageCodec,
    layout: GridLayout,
    anchor: SlotAnchor,
}

impl<'a, R> GridLayoutCompositor<'a, R>
where
    R: PageRasterizer + ?Sized,
{
    pub fn new(rasterizer: &'a R, images: &'a dyn ImageCodec, layout: GridLayout) -> Self {
        Self {
            rasterizer,
            images,
            layout,
            anchor: SlotAnchor::default(),
        }
    }

    pub fn with_anchor(mut self, anchor: SlotAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    /// Compose `source` onto `ceil(pages / slots)` sheets.
    pub fn compose(
        &self,
        source: &Document,
        progress: &dyn PipelineProgress,
    ) -> Result<Document, InvertError> {
        self.layout.validate()?;
        let total = self.layout.sheet_count(source.page_count());
        let mut sheets = Vec::with_capacity(total);

        for (i, group) in source.pages().chunks(self.layout.slots).enumerate() {
            let sheet_no = i + 1;
            let first_page = i * self.layout.slots;
            let encoded = self.encode_group(group, first_page)?;
            sheets.push(self.build_sheet(group, encoded, sheet_no));
            debug!("Composed sheet {}/{} ({} pages)", sheet_no, total, group.len());
            progress.on_sheet_composed(sheet_no, total);
        }

        Ok(Document::from_pages(sheets))
    }

    /// Rasterise and PNG-encode one group, keeping slot order.
    fn encode_group(&self, group: &[Page], first_page: usize) -> Result<Vec<EncodedImage>, InvertError> {
        let bitmaps = self.rasterizer.rasterize_all(group, Scale::IDENTITY)?;
        if bitmaps.len() != group.len() {
            return Err(InvertError::Internal(format!(
                "rasteriser returned {} bitmaps for {} pages",
                bitmaps.len(),
                group.len()
            )));
        }

        bitmaps
            .par_iter()
            .enumerate()
            .map(|(j, bitmap)| {
                self.images
                    .encode(bitmap, RasterFormat::Png)
                    .map_err(|e| match e {
                        InvertError::ImageEncode { detail, .. } => InvertError::ImageEncode {
                            page: first_page + j + 1,
                            detail,
                        },
                        other => other,
                    })
            })
            .collect()
    }

    fn build_sheet(&self, group: &[Page], encoded: Vec<EncodedImage>, sheet_no: usize) -> Page {
        let layout = &self.layout;
        let mut sheet = Page::blank(layout.page_width, layout.page_height);

        for (j, (page, image)) in group.iter().zip(encoded).enumerate() {
            let rect = fit_rect(layout.slot_rect(j), page.width(), page.height(), self.anchor);
            sheet.push(Content::Image { rect, image });
        }

        sheet.push(Content::Text(TextLabel {
            text: format!("Page {sheet_no}"),
            origin: layout.label_origin(),
            font: StandardFont::Helvetica,
            font_size: layout.label_font_size,
            color: [0, 0, 0],
        }));
        sheet
    }
}
