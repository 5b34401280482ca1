//! # pdfinvert
//!
//! Invert the colours of PDF documents, merge them, and lay the result out
//! three pages to an A4 sheet, ready for printing as dark-on-light handouts.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF × N
//!  │
//!  ├─ A. Invert   rasterise each page (pdfium), 255 - v per channel, rebuild
//!  ├─ B. Merge    concatenate the inverted documents in submission order
//!  ├─ C. Layout   3 pages per 595 × 842 sheet, "Page n" in the corner
//!  └─ D. Bundle   ZIP holding the final PDF as its only entry
//! ```
//!
//! Results are kept in an [`ArtifactStore`] under a random identifier and
//! retrieved through [`InvertService`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfinvert::{InvertService, PdfiumBackend, Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = PdfiumBackend::locate()?;
//!     let service = InvertService::new(Pipeline::new(backend, PipelineConfig::default()));
//!
//!     let receipt = service.submit_inputs(&["slides-1.pdf", "slides-2.pdf"]).await?;
//!     let pdf = service.document(&receipt.id.to_string())?;
//!     std::fs::write(pdf.download_name(), &pdf.bytes[..])?;
//!     eprintln!("{} sheets", receipt.stats.sheets);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfinvert` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdfinvert = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod remote;
pub mod service;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{DocumentCodec, ImageCodec, PageRasterizer, PdfBackend, PdfiumBackend, PngCodec};
pub use config::{GridLayout, PipelineConfig, PipelineConfigBuilder, SlotAnchor};
pub use error::{ErrorKind, InvertError, RemoteOp};
pub use model::{Bitmap, Document, Page, Rect, Scale};
pub use pipeline::{process, Pipeline, PipelineOutput, PipelineStats};
pub use progress::{NoopProgress, PipelineProgress, ProgressCallback};
pub use remote::{invert_remote, DirectoryBlobStore, RemoteBlobStore, RemoteId, RemoteOutcome, RemoteSettings};
pub use service::{InvertService, SubmitReceipt};
pub use store::{Artifact, ArtifactId, ArtifactKind, ArtifactStore, RetentionPolicy};
