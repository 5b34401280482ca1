//! In-memory document model shared by every pipeline stage.
//!
//! Coordinates are in page units with the origin at the **top-left** corner
//! and `y` growing downwards. Backends that speak PDF's bottom-left
//! convention convert at their boundary.

use image::{DynamicImage, RgbImage};
use std::fmt;
use std::sync::Arc;

/// Linear rasterisation scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Scale {
    /// 1 page unit = 1 pixel.
    pub const IDENTITY: Scale = Scale { x: 1.0, y: 1.0 };

    pub fn uniform(factor: f32) -> Self {
        Self {
            x: factor,
            y: factor,
        }
    }

    /// Pixel dimensions of a `width` × `height` page rendered at this scale.
    pub fn pixel_size(&self, width: f32, height: f32) -> (u32, u32) {
        let w = (width * self.x).round().max(1.0) as u32;
        let h = (height * self.y).round().max(1.0) as u32;
        (w, h)
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Axis-aligned rectangle, `x1 > x0` and `y1 > y0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Rectangle at the origin.
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_valid(&self) -> bool {
        self.x1 > self.x0 && self.y1 > self.y0
    }

    /// `true` if the interiors share any area.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    /// `true` if `other` lies entirely inside `self` (edges may touch).
    pub fn contains(&self, other: &Rect) -> bool {
        other.x0 >= self.x0 && other.y0 >= self.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }
}

/// An RGB8 raster, row-major, no alpha.
#[derive(Clone, PartialEq)]
pub struct Bitmap {
    pixels: RgbImage,
}

impl Bitmap {
    pub fn new(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    /// Every pixel set to `rgb`.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    /// Flatten any decoded image to RGB8, dropping alpha.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.into_rgb8())
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.pixels.get_pixel(x, y).0
    }

    /// Raw channel data, `width * height * 3` bytes.
    pub fn samples(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn samples_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbImage {
        self.pixels
    }

    /// `true` if every pixel equals `rgb`.
    pub fn is_uniform(&self, rgb: [u8; 3]) -> bool {
        self.pixels.pixels().all(|p| p.0 == rgb)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Raster formats an embedded image may be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
}

/// Encoded raster embedded in a page.
#[derive(Clone, PartialEq)]
pub struct EncodedImage {
    pub format: RasterFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Built-in fonts every backend must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StandardFont {
    #[default]
    Helvetica,
}

/// A single line of text. `origin` is the left end of the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub origin: Point,
    pub font: StandardFont,
    pub font_size: f32,
    pub color: [u8; 3],
}

/// Drawable content of a composed page.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// `image` stretched over `rect`.
    Image { rect: Rect, image: EncodedImage },
    Text(TextLabel),
}

/// The original bytes of a parsed document, shared by all its pages.
#[derive(Clone)]
pub struct SourceBytes(Arc<[u8]>);

impl SourceBytes {
    pub fn new(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Same underlying buffer (not just equal contents).
    pub fn same_document(&self, other: &SourceBytes) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SourceBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceBytes({} bytes)", self.0.len())
    }
}

/// A page still owned by its original encoded document.
#[derive(Debug, Clone)]
pub struct SourcePage {
    pub document: SourceBytes,
    /// 0-based index within `document`.
    pub index: usize,
}

#[derive(Debug, Clone)]
pub enum PageBody {
    /// Parsed from an input document; opaque to everything but the backend.
    Source(SourcePage),
    /// Built by this crate.
    Composed(Vec<Content>),
}

/// One page: a size and what is drawn on it.
#[derive(Debug, Clone)]
pub struct Page {
    width: f32,
    height: f32,
    body: PageBody,
}

impl Page {
    /// Empty composed page.
    pub fn blank(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            body: PageBody::Composed(Vec::new()),
        }
    }

    pub fn from_source(width: f32, height: f32, source: SourcePage) -> Self {
        Self {
            width,
            height,
            body: PageBody::Source(source),
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    pub fn body(&self) -> &PageBody {
        &self.body
    }

    pub fn source(&self) -> Option<&SourcePage> {
        match &self.body {
            PageBody::Source(s) => Some(s),
            PageBody::Composed(_) => None,
        }
    }

    /// Composed content; empty for source pages.
    pub fn contents(&self) -> &[Content] {
        match &self.body {
            PageBody::Composed(c) => c,
            PageBody::Source(_) => &[],
        }
    }

    /// Append content. A source page is replaced by a blank composed page of
    /// the same size first, since its original content cannot be edited.
    pub fn push(&mut self, content: Content) {
        if let PageBody::Source(_) = self.body {
            self.body = PageBody::Composed(Vec::new());
        }
        if let PageBody::Composed(items) = &mut self.body {
            items.push(content);
        }
    }

    /// Text labels drawn on this page, in drawing order.
    pub fn labels(&self) -> impl Iterator<Item = &TextLabel> {
        self.contents().iter().filter_map(|c| match c {
            Content::Text(label) => Some(label),
            Content::Image { .. } => None,
        })
    }

    /// Image placements on this page, in drawing order.
    pub fn images(&self) -> impl Iterator<Item = (&Rect, &EncodedImage)> {
        self.contents().iter().filter_map(|c| match c {
            Content::Image { rect, image } => Some((rect, image)),
            Content::Text(_) => None,
        })
    }
}

/// An ordered sequence of pages.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pages: Vec<Page>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pages(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn push(&mut self, page: Page) {
        self.pages.push(page);
    }

    /// Move every page of `other` to the end of `self`, keeping their order.
    pub fn append(&mut self, other: Document) {
        self.pages.extend(other.pages);
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }
}
