//! In-memory backend for integration tests.
//!
//! Documents are registered under arbitrary byte keys; `serialize` records
//! the document and hands back a short token that `parse` resolves again, so
//! every stage can be inspected without a PDF engine.

#![allow(dead_code)]

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use pdfinvert::backend::{DocumentCodec, ImageCodec, PageRasterizer, PngCodec};
use pdfinvert::model::{Content, PageBody, RasterFormat};
use pdfinvert::{Bitmap, Document, InvertError, Page, Rect, Scale};
use std::collections::HashMap;

const WRITTEN_PREFIX: &[u8] = b"%PDF-fake-";

pub const WHITE: [u8; 3] = [255, 255, 255];
pub const BLACK: [u8; 3] = [0, 0, 0];

#[derive(Default)]
pub struct FakeBackend {
    sources: HashMap<Vec<u8>, Document>,
    written: Mutex<Vec<Document>>,
    password: Option<String>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `key` parse as `document`. Keys should start with `%PDF` so the
    /// input checks accept them.
    pub fn with_source(mut self, key: &[u8], document: Document) -> Self {
        self.sources.insert(key.to_vec(), document);
        self
    }

    /// Document behind bytes previously returned by `serialize`.
    pub fn written(&self, bytes: &[u8]) -> Document {
        self.parse(bytes, 0).expect("bytes were not produced by this backend")
    }

    pub fn written_count(&self) -> usize {
        self.written.lock().len()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl DocumentCodec for FakeBackend {
    fn parse(&self, bytes: &[u8], document: usize) -> Result<Document, InvertError> {
        if let Some(token) = bytes.strip_prefix(WRITTEN_PREFIX) {
            let index: usize = std::str::from_utf8(token)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| InvertError::CorruptDocument {
                    document,
                    detail: "bad token".into(),
                })?;
            return self
                .written
                .lock()
                .get(index)
                .cloned()
                .ok_or_else(|| InvertError::CorruptDocument {
                    document,
                    detail: "unknown token".into(),
                });
        }
        self.sources
            .get(bytes)
            .cloned()
            .ok_or_else(|| InvertError::CorruptDocument {
                document,
                detail: "unregistered source".into(),
            })
    }

    fn serialize(&self, document: &Document) -> Result<Vec<u8>, InvertError> {
        let mut written = self.written.lock();
        written.push(document.clone());
        let mut bytes = WRITTEN_PREFIX.to_vec();
        bytes.extend_from_slice((written.len() - 1).to_string().as_bytes());
        Ok(bytes)
    }

    fn set_password(&mut self, password: Option<String>) {
        self.password = password;
    }
}

impl PageRasterizer for FakeBackend {
    /// White canvas with every image content stretched over its rect; text
    /// is not drawn.
    fn rasterize(&self, page: &Page, scale: Scale) -> Result<Bitmap, InvertError> {
        let (w, h) = scale.pixel_size(page.width(), page.height());
        let mut canvas = RgbImage::from_pixel(w, h, Rgb(WHITE));

        let contents = match page.body() {
            PageBody::Composed(contents) => contents,
            PageBody::Source(_) => {
                return Err(InvertError::Internal("fake backend has no source pages".into()))
            }
        };
        for content in contents {
            if let Content::Image { rect, image } = content {
                let decoded = PngCodec.decode(image)?.into_image();
                let (rw, rh) = scale.pixel_size(rect.width(), rect.height());
                let resized = imageops::resize(&decoded, rw, rh, FilterType::Nearest);
                let x = (rect.x0 * scale.x).round() as i64;
                let y = (rect.y0 * scale.y).round() as i64;
                imageops::overlay(&mut canvas, &resized, x, y);
            }
        }
        Ok(Bitmap::new(canvas))
    }
}

/// A page showing a single solid-colour image.
pub fn solid_page(width: u32, height: u32, rgb: [u8; 3]) -> Page {
    let image = PngCodec
        .encode(&Bitmap::filled(width, height, rgb), RasterFormat::Png)
        .expect("png encode");
    let mut page = Page::blank(width as f32, height as f32);
    page.push(Content::Image {
        rect: Rect::from_size(width as f32, height as f32),
        image,
    });
    page
}

/// `count` solid pages of the given colour.
pub fn solid_document(count: usize, width: u32, height: u32, rgb: [u8; 3]) -> Document {
    Document::from_pages((0..count).map(|_| solid_page(width, height, rgb)).collect())
}

/// Decoded bitmaps of every image on `page`, with their rects, in drawing order.
pub fn page_images(page: &Page) -> Vec<(Rect, Bitmap)> {
    page.images()
        .map(|(rect, image)| (*rect, PngCodec.decode(image).expect("png decode")))
        .collect()
}
